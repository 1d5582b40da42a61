use log::{debug, info, warn};

use acta_engine::*;
use snafu::{prelude::*, Snafu};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::fs;
use text_diff::print_diff;

use crate::args::Args;

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("File {path} is not valid JSON: {source}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Could not write the report to {path}: {source}"))]
    WritingReport {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not format the report: {source}"))]
    FormattingReport { source: serde_json::Error },
    #[snafu(display("Unknown election category {category}"))]
    UnknownCategory { category: String },
    #[snafu(display("Category {category} has no acta at index {index}"))]
    MissingActa { category: String, index: usize },
    #[snafu(display("{source}"))]
    Engine { source: ActaError },
    #[snafu(display("Difference detected between the report and the reference report"))]
    DifferentFromReference {},
}

pub type CliResult<T> = Result<T, CliError>;

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> CliResult<T> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read {}: {} bytes", path, contents.len());
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

/// The JSON summary of a report. Counts are written as strings, like the
/// printed actas do.
pub fn report_to_json(report: &ActaReport) -> JSValue {
    let mut vote_count: JSMap<String, JSValue> = JSMap::new();
    for (party, count) in report.tally.vote_count.iter() {
        vote_count.insert(party.clone(), json!(count.to_string()));
    }

    let mut preferential: JSMap<String, JSValue> = JSMap::new();
    for (party, row) in report.tally.preferential_matrix.iter() {
        if row.total == 0 {
            continue;
        }
        let mut candidates: JSMap<String, JSValue> = JSMap::new();
        for (idx, count) in row.counts.iter().enumerate() {
            if *count > 0 {
                candidates.insert((idx + 1).to_string(), json!(count.to_string()));
            }
        }
        preferential.insert(
            party.clone(),
            json!({"total": row.total.to_string(), "candidates": candidates}),
        );
    }

    let acta = &report.acta;
    let stats = &report.tally.statistics;
    json!({
        "acta": {
            "category": report.category,
            "actaNumber": acta.acta_number,
            "mesaNumber": format!("{:06}", acta.mesa_number),
            "state": acta.state().to_string(),
            "circunscripcionElectoral": acta.selected_location.circunscripcion_electoral,
            "jee": acta.selected_location.jee,
            "tcv": acta.tcv,
            "cedulasExcedentes": acta.cedulas_excedentes,
        },
        "results": {
            "voteCount": vote_count,
            "preferentialVotes": preferential,
        },
        "statistics": {
            "totalValidVotes": stats.total_valid_votes.to_string(),
            "blankAndNull": stats.blank_and_null.to_string(),
            "totalVotersWhoVoted": stats.total_voters_who_voted.to_string(),
            "totalElectores": stats.total_electores.to_string(),
            "participationRate": format!("{:.2}", stats.participation_rate),
            "absenteeismRate": format!("{:.2}", stats.absenteeism_rate),
        }
    })
}

fn write_output(out: &Option<String>, contents: &str) -> CliResult<()> {
    match out.as_deref() {
        None | Some("") | Some("stdout") => {
            println!("{}", contents);
            Ok(())
        }
        Some(path) => {
            info!("Writing the report to {}", path);
            fs::write(path, contents).context(WritingReportSnafu { path })
        }
    }
}

pub async fn run_report(args: &Args) -> CliResult<()> {
    let reference: StaticReference = read_json(&args.reference_data)?;
    let config: EngineConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => EngineConfig::default(),
    };
    let ctx = AppContext::new(FileStorage::new(&args.store), reference, config);

    let category = match &args.category {
        Some(c) => c.clone(),
        None => ctx
            .repository
            .active_category()
            .await
            .unwrap_or_else(|| ctx.config.default_category.clone()),
    };
    ensure!(
        ctx.config.has_category(&category),
        UnknownCategorySnafu { category }
    );

    if args.list {
        let actas = list_actas(&ctx, &category).await.context(EngineSnafu)?;
        let pretty = serde_json::to_string_pretty(&actas).context(FormattingReportSnafu)?;
        return write_output(&args.out, &pretty);
    }

    let index = match args.index {
        Some(i) => i,
        None => ctx.repository.active_acta_index(&category).await,
    };
    let acta = ctx
        .repository
        .acta(&category, index)
        .await
        .context(MissingActaSnafu {
            category: category.clone(),
            index,
        })?;
    info!(
        "Reporting acta {} of {} ({}, {} votes)",
        index,
        category,
        acta.state(),
        acta.vote_entries.len()
    );

    let report = build_report(&ctx, &category, &acta).await;
    let report_js = report_to_json(&report);
    let pretty_js = serde_json::to_string_pretty(&report_js).context(FormattingReportSnafu)?;
    write_output(&args.out, &pretty_js)?;

    // The reference report, if provided for comparison
    if let Some(reference_path) = &args.reference {
        let reference_js: JSValue = read_json(reference_path)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference_js).context(FormattingReportSnafu)?;
        if pretty_reference != pretty_js {
            warn!("Found differences with the reference report");
            print_diff(pretty_reference.as_str(), pretty_js.as_str(), "\n");
            return DifferentFromReferenceSnafu {}.fail();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn reference() -> StaticReference {
        StaticReference::new()
            .with_mesa(
                123456,
                MesaInfo {
                    departamento: "PIURA".to_string(),
                    provincia: "PIURA".to_string(),
                    distrito: "CASTILLA".to_string(),
                    circunscripcion: "PIURA".to_string(),
                    total_electores: 4,
                    jee: Some("PIURA".to_string()),
                },
            )
            .with_circunscripciones("senadoresRegional", &["PIURA"])
            .with_vote_limits(
                "senadoresRegional",
                None,
                VoteLimits {
                    preferential1: 2,
                    preferential2: 0,
                },
            )
            .with_organizations(vec![
                Organization {
                    key: "P01".to_string(),
                    order: 1,
                    name: "Partido Uno".to_string(),
                },
                Organization {
                    key: NULO.to_string(),
                    order: 99,
                    name: "Voto nulo".to_string(),
                },
            ])
    }

    async fn record_acta(store: &Path) {
        let ctx = AppContext::new(
            FileStorage::new(store),
            reference(),
            EngineConfig::default(),
        );
        ctx.repository
            .save_selected_organizations(&SelectionScope::Global, &["P01".to_string()])
            .await
            .unwrap();
        let mut machine = switch_category(&ctx, "senadoresRegional").await.unwrap();
        machine.load_mesa_info(&ctx, 123456).unwrap();
        machine.commit_mesa_data(&ctx).await.unwrap();
        let drafts = [
            VoteDraft::party("P01").with_preferential(Some(2), None),
            VoteDraft::party("P01"),
            VoteDraft::party(NULO),
        ];
        for draft in drafts.iter() {
            machine.add_vote_entry(&ctx, draft).await.unwrap();
        }
        machine.finalize(&ctx).await.unwrap();
    }

    fn args(store: &Path, reference_data: &Path) -> Args {
        Args {
            store: store.display().to_string(),
            reference_data: reference_data.display().to_string(),
            config: None,
            category: None,
            index: None,
            list: false,
            reference: None,
            out: None,
            verbose: false,
        }
    }

    #[tokio::test]
    async fn report_of_the_active_acta() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("actas.json");
        let reference_data = dir.path().join("reference_data.json");
        let out = dir.path().join("report.json");
        fs::write(
            &reference_data,
            serde_json::to_string(&reference()).unwrap(),
        )
        .unwrap();
        record_acta(&store).await;

        let mut a = args(&store, &reference_data);
        a.out = Some(out.display().to_string());
        run_report(&a).await.unwrap();

        let js: JSValue = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(js["acta"]["category"], "senadoresRegional");
        assert_eq!(js["acta"]["actaNumber"], "123456-PIURA-senadoresRegional");
        assert_eq!(js["acta"]["state"], "finalized");
        assert_eq!(js["results"]["voteCount"]["P01"], "2");
        assert_eq!(js["results"]["voteCount"]["NULO"], "1");
        assert_eq!(js["results"]["preferentialVotes"]["P01"]["candidates"]["2"], "1");
        assert_eq!(js["statistics"]["participationRate"], "75.00");

        // The output is its own reference.
        let mut check = args(&store, &reference_data);
        check.reference = Some(out.display().to_string());
        check.out = Some(dir.path().join("report2.json").display().to_string());
        run_report(&check).await.unwrap();

        // A tampered reference is reported.
        let mut tampered = js.clone();
        tampered["results"]["voteCount"]["P01"] = json!("3");
        fs::write(&out, serde_json::to_string(&tampered).unwrap()).unwrap();
        assert!(matches!(
            run_report(&check).await,
            Err(CliError::DifferentFromReference {})
        ));
    }

    #[tokio::test]
    async fn unknown_category_or_index() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("actas.json");
        let reference_data = dir.path().join("reference_data.json");
        fs::write(
            &reference_data,
            serde_json::to_string(&reference()).unwrap(),
        )
        .unwrap();

        let mut a = args(&store, &reference_data);
        a.category = Some("alcaldes".to_string());
        assert!(matches!(
            run_report(&a).await,
            Err(CliError::UnknownCategory { .. })
        ));
        a.category = Some("diputados".to_string());
        a.index = Some(3);
        assert!(matches!(
            run_report(&a).await,
            Err(CliError::MissingActa { index: 3, .. })
        ));
    }
}
