/*!

This is the long-form manual for `acta_engine` and the `actas` program.

## Actas

An acta is the record of the manual count of one mesa (polling table) for one
election category. An operator reads each ballot aloud and records it: the
party chosen (or `BLANCO` / `NULO`) and, for the categories that have them, up
to two preferential votes (candidate numbers within the party list).

The same mesa is counted once per category. The first count of a mesa fixes its
TCV (total de ciudadanos que votaron): the other categories of the same mesa
must end up with exactly that many ballots.

## Lifecycle

| state            | how it is reached                   | what can be done                              |
|------------------|-------------------------------------|-----------------------------------------------|
| `Empty`          | new acta, or after `reinitialize`   | `load_mesa_info`                              |
| `MesaLoaded`     | `load_mesa_info`                    | `assign_jee`, `load_mesa_info`, `commit_mesa_data` |
| `SessionActive`  | `commit_mesa_data`, `resume`        | `add_vote_entry`, `edit_last_entry`, `set_cedulas_excedentes`, `pause`, `finalize` |
| `Paused`         | `pause`                             | `resume`                                      |
| `Finalized`      | `finalize`                          | `mark_conformidad_downloaded`, `reinitialize` |

Every transition that changes the record saves it before the change becomes
visible. If the store refuses the write, the acta stays as it was and the
operation returns `ActaError::Storage`.

Ballots are numbered from 1 without gaps. Only the most recent ballot can be
corrected. The number of ballots never exceeds the number of electores of the
mesa, and a finalized acta is never modified again.

## Election categories

| category            | preferential votes |
|---------------------|--------------------|
| `presidencial`      | none               |
| `senadoresNacional` | two                |
| `senadoresRegional` | one                |
| `diputados`         | two                |
| `parlamentoAndino`  | two                |

This is the default configuration. An `EngineConfig` can be read from JSON to
change it:

```json
{
  "categories": [
    {"name": "presidencial", "preferential": {"hasPreferential1": false, "hasPreferential2": false}},
    {"name": "diputados", "preferential": {"hasPreferential1": true, "hasPreferential2": true}}
  ],
  "defaultCategory": "presidencial"
}
```

## Partial recount

When partial recount mode is on for a circunscripción, new actas of that
circunscripción only count the organizations of the partial recount selection.
They do not take part in the TCV of the mesa. Finalizing such an acta turns the
mode off.

## Reference data

The `actas` program reads the reference data (mesas, circunscripciones, vote
limits and the organization catalog) from a JSON document:

```json
{
  "mesas": {
    "123456": {"departamento": "LIMA", "provincia": "LIMA", "distrito": "MIRAFLORES",
               "circunscripcionElectoral": "LIMA", "totalElectores": 300, "jee": "LIMA CENTRO 1"}
  },
  "circunscripciones": {"presidencial": ["PERU"], "diputados": ["LIMA", "CUSCO"]},
  "voteLimits": [
    {"category": "diputados", "circunscripcion": "LIMA", "limits": {"preferential1": 33, "preferential2": 33}}
  ],
  "organizations": [
    {"key": "P01", "order": 1, "name": "Partido Uno"},
    {"key": "BLANCO", "order": 98, "name": "Voto en blanco"},
    {"key": "NULO", "order": 99, "name": "Voto nulo"}
  ]
}
```

## Reports

```bash
actas --store actas.json --reference-data reference.json --category diputados --index 0 \
  --out report.json
```

The report holds the acta and its tally: the votes per organization, the
preferential votes per candidate, and the participation statistics. With
`--reference`, the report is compared to a previously produced one and the
differences are printed.

 */
