/*!

This is the long-form manual for `hackathon_ranking` and `hackrank`.

## How teams are ranked

Judges do not all rate the same way: some are harsh, some lenient, some use
the whole scale and some stay in the middle. Comparing raw totals would
reward the teams that happened to meet a lenient judge. The ranking runs in
two phases.

**Judge phase.** For every judge, the mean and the population standard
deviation (divisor `n`) of all the totals they gave are computed. Each score
becomes a z-score: `(total - mean) / std_dev`. A judge who gave a single
score, or the same total everywhere, has no dispersion; their scores count
as `0`, a neutral signal. The normalized score of a team is the average of
its z-scores. Teams are sorted by normalized score, ties keep the order in
which the teams first appear in the scores.

**Final phase.** The finalists are picked (see below). Their normalized scores
are rescaled to `[0, 1]` across the finalists only:
`(z - min) / (max - min)`, or `0.5` for everyone when all finalists are
equal. The vote share of a finalist is its number of votes divided by the
number of votes cast for any finalist (`0` when nobody voted). The final score is

```text
final = 0.5 * rescaled judge score + 0.5 * vote share
```

A finalist without judge scores counts as a z-score of `0` and can still win
on votes.

## Finalists

* `topN` (default, 6 teams): the best teams by normalized score. Teams listed
  in `exclude` are skipped. Teams listed in `include` are added; when the list
  is full, an included team takes the slot of the lowest ranked team that was
  not itself included. Names are matched ignoring case and surrounding spaces.
* `explicit`: the list in `teams`, as written.

Votes are counted on the exact team name. A finalist without judge scores
takes the spelling of the vote sheet when the two differ only by case or
surrounding spaces. A finalist that has neither judge scores nor votes is
reported with a warning: check the spelling of its name.

With no scores at all, `topN` selects nobody and the ranking is empty, while
an `explicit` list is still ranked on votes alone.

## Input formats

The inputs are exports of the event spreadsheet. Columns are found by their
header in the first row (the first non-empty row of a worksheet); the order
of the columns does not matter.

### `Scores`

| column | content |
|--------|---------|
| `judge_name` | the judge |
| `team_name` | the team |
| `idea` | optional, the project idea shown in the output |
| `technical`, `creativity`, `presentation`, `usefulness` | criteria, 1 to 10 |
| `total` | used when the criteria are missing, 4 to 40 |
| `timestamp` | RFC 3339, e.g. `2025-03-01T14:05:00.000Z` |

When a judge scored a team more than once, the most recent score is kept.

### `Votes`

| column | content |
|--------|---------|
| `email` | the voter |
| `team_voted_for` | the team (`team_name` is also accepted) |

Only the first vote of a voter counts. Voters are compared ignoring case and
surrounding spaces.

### `Participants`

Optional. When provided, only the emails listed with a non-empty
`team_name` may vote; other votes are skipped with a warning.

### Providers

* `csv`: one CSV file per sheet, with a header row.
* `xlsx`: one workbook (for example downloaded from the spreadsheet), with
  one worksheet per sheet. The worksheets are named `Scores`, `Votes` and
  `Participants` unless configured otherwise.

## Configuration

`hackrank` accepts a JSON configuration file with the `--config` flag. The
file paths are relative to the configuration file.

```json
{
  "outputSettings": {
    "eventName": "Spring Hackathon",
    "eventDate": "2025-03-01",
    "outputPath": "summary.json"
  },
  "scoresSource": { "provider": "xlsx", "filePath": "event.xlsx", "worksheetName": "Scores" },
  "votesSource": { "provider": "xlsx", "filePath": "event.xlsx", "worksheetName": "Votes" },
  "finalists": { "mode": "topN", "count": 6, "include": ["Late Team"], "exclude": [] }
}
```

Flags given on the command line take precedence over the configuration file.

*/
