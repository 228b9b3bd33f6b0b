//! Offline replay of JSON-lines telemetry traces.
//!
//! Each [`TraceRecord`] drives the shaper the way a live environment would:
//! `new_episode` resets, `step` observes a snapshot and pays the reward, and
//! `episode_finished` closes the episode and emits its statistics as one JSON
//! line on the output.

use std::io::{self, BufRead, Write};

use shaping_schema::TraceRecord;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ShapingError;
use crate::shaper::RewardShaper;
use crate::statistics::ShapingStatistics;

/// Extra lines printed after the trace is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Statistics averaged over every finished episode.
    pub summary: bool,
    /// Heat matrix at the configured size, as nested rows.
    pub heat_matrix: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub episodes: Vec<ShapingStatistics>,
    pub steps: u64,
    pub total_reward: f64,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read trace line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse trace line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("trace line {line}: {source}")]
    Shaping {
        line: usize,
        #[source]
        source: ShapingError,
    },
    #[error("no finished episodes to summarize")]
    NoFinishedEpisodes,
    #[error(transparent)]
    HeatMatrix(ShapingError),
    #[error("failed to write replay output: {0}")]
    Write(#[from] io::Error),
    #[error("failed to encode replay output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Replays `trace` through `shaper`, writing one statistics line per finished
/// episode to `out`. Blank lines are skipped.
pub fn replay_trace<R, W>(
    shaper: &mut RewardShaper,
    trace: R,
    out: &mut W,
    options: ReplayOptions,
) -> Result<ReplayReport, ReplayError>
where
    R: BufRead,
    W: Write,
{
    let mut report = ReplayReport::default();

    for (index, line) in trace.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| ReplayError::Read {
            line: line_number,
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let record = TraceRecord::from_json_line(&line).map_err(|source| ReplayError::Parse {
            line: line_number,
            source,
        })?;
        let at_line = |source: ShapingError| ReplayError::Shaping {
            line: line_number,
            source,
        };
        match record {
            TraceRecord::NewEpisode => shaper.new_episode(),
            TraceRecord::Step { reward, variables } => {
                shaper.observe(variables).map_err(at_line)?;
                report.total_reward += shaper.get_reward(reward).map_err(at_line)?;
                report.steps += 1;
            }
            TraceRecord::EpisodeFinished => {
                shaper.episode_finished().map_err(at_line)?;
                let stats = shaper.get_statistics();
                writeln!(out, "{}", serde_json::to_string(&stats)?)?;
                report.episodes.push(stats);
            }
        }
    }

    if report.episodes.is_empty() {
        warn!(
            target: "roe_shaping::replay",
            steps = report.steps,
            "replay.no_finished_episodes"
        );
    }
    info!(
        target: "roe_shaping::replay",
        episodes = report.episodes.len(),
        steps = report.steps,
        "replay.complete"
    );

    if options.summary {
        if report.episodes.is_empty() {
            return Err(ReplayError::NoFinishedEpisodes);
        }
        let summary = ShapingStatistics::average(&report.episodes);
        writeln!(out, "{}", serde_json::to_string(&summary)?)?;
    }

    if options.heat_matrix {
        let matrix = shaper.heat_matrix().map_err(ReplayError::HeatMatrix)?;
        writeln!(out, "{}", serde_json::to_string(&matrix.to_rows())?)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use shaping_schema::{GameVariable, VariableSnapshot};

    use super::*;
    use crate::config::ShapingConfig;

    fn step_line(health: f64, x: f64) -> String {
        TraceRecord::Step {
            reward: -0.5,
            variables: VariableSnapshot::zeroed()
                .with(GameVariable::Health, health)
                .with(GameVariable::PositionX, x)
                .with(GameVariable::PositionY, x),
        }
        .to_json_line()
        .unwrap()
    }

    fn trace() -> String {
        let new_episode = TraceRecord::NewEpisode.to_json_line().unwrap();
        let finished = TraceRecord::EpisodeFinished.to_json_line().unwrap();
        [
            new_episode.clone(),
            step_line(100.0, 0.0),
            String::new(),
            step_line(110.0, 4.0),
            finished.clone(),
            "   ".to_string(),
            new_episode,
            step_line(100.0, 0.0),
            step_line(100.0, 8.0),
            finished,
        ]
        .join("\n")
    }

    fn output_lines(out: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn prints_one_line_per_episode_and_skips_blanks() {
        let mut shaper = RewardShaper::new(&ShapingConfig::default()).unwrap();
        let mut out = Vec::new();
        let report = replay_trace(
            &mut shaper,
            trace().as_bytes(),
            &mut out,
            ReplayOptions::default(),
        )
        .unwrap();

        assert_eq!(report.steps, 4);
        assert_eq!(report.episodes.len(), 2);
        // The second episode's movement is paid at weight 1.
        assert!((report.total_reward + 1.0).abs() < 1e-9);

        let lines = output_lines(&out);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["PICKUP_HEALTH"], 1.0);
        assert_eq!(lines[1]["PICKUP_HEALTH"], 0.0);
        assert_eq!(lines[1]["mean_PICKUP_HEALTH"], 0.5);
        assert_eq!(lines[1]["extrinsic_reward"], -1.0);
    }

    #[test]
    fn summary_and_heat_matrix_follow_the_episodes() {
        let mut config = ShapingConfig::default();
        config.heat_matrix.rows = 4;
        config.heat_matrix.cols = 3;
        let mut shaper = RewardShaper::new(&config).unwrap();
        let mut out = Vec::new();
        let options = ReplayOptions {
            summary: true,
            heat_matrix: true,
        };
        replay_trace(&mut shaper, trace().as_bytes(), &mut out, options).unwrap();

        let lines = output_lines(&out);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2]["PICKUP_HEALTH"], 0.5);
        assert_eq!(lines[2]["extrinsic_reward"], -1.0);

        let rows = lines[3].as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows
            .iter()
            .all(|row| row.as_array().map(Vec::len) == Some(3)));
    }

    #[test]
    fn summary_without_finished_episodes_fails() {
        let mut shaper = RewardShaper::new(&ShapingConfig::default()).unwrap();
        let mut out = Vec::new();
        let trace = format!(
            "{}\n{}\n",
            TraceRecord::NewEpisode.to_json_line().unwrap(),
            step_line(100.0, 0.0)
        );
        let options = ReplayOptions {
            summary: true,
            heat_matrix: false,
        };
        let err = replay_trace(&mut shaper, trace.as_bytes(), &mut out, options).unwrap_err();
        assert!(matches!(err, ReplayError::NoFinishedEpisodes));
        assert!(out.is_empty());
    }

    #[test]
    fn errors_name_the_offending_line() {
        let mut shaper = RewardShaper::new(&ShapingConfig::default()).unwrap();
        let mut out = Vec::new();
        let bad_json = format!("{}\n{{ not json", TraceRecord::NewEpisode.to_json_line().unwrap());
        let err = replay_trace(
            &mut shaper,
            bad_json.as_bytes(),
            &mut out,
            ReplayOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));

        // A step before any new_episode record.
        let mut shaper = RewardShaper::new(&ShapingConfig::default()).unwrap();
        let err = replay_trace(
            &mut shaper,
            step_line(100.0, 0.0).as_bytes(),
            &mut out,
            ReplayOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Shaping {
                line: 1,
                source: ShapingError::Lifecycle { .. }
            }
        ));
    }
}
