//! Reporting and export: CSV trade tape and equity curve, JSON artifacts,
//! and a plain-text backtest summary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hedgelab_core::domain::{EquityPoint, ExitReason, Side, Trade};
use serde::Serialize;

use crate::metrics::BacktestSummary;
use crate::runner::{BacktestRun, SCHEMA_VERSION};
use crate::walk_forward::WalkForwardResult;

// ─── CSV export ─────────────────────────────────────────────────────

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Long => "long",
        Side::Short => "short",
    }
}

fn exit_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::TakeProfit => "take_profit",
        ExitReason::StopLoss => "stop_loss",
        ExitReason::EndOfData => "end_of_data",
    }
}

/// Trade tape as CSV, one row per closed trade in exit order.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "side",
        "entry_time",
        "entry_index",
        "entry_price",
        "size",
        "entry_atr",
        "confidence",
        "volatility_ratio",
        "margin",
        "exit_time",
        "exit_index",
        "exit_price",
        "pnl_points",
        "pnl",
        "holding_bars",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.id.0.to_string(),
            side_label(t.side).to_string(),
            t.entry_time.to_string(),
            t.entry_index.to_string(),
            format!("{:.6}", t.entry_price),
            format!("{:.4}", t.size),
            format!("{:.6}", t.entry_atr),
            format!("{:.4}", t.confidence),
            format!("{:.6}", t.volatility_ratio),
            format!("{:.4}", t.margin),
            t.exit_time.to_string(),
            t.exit_index.to_string(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.pnl_points),
            format!("{:.4}", t.pnl),
            t.holding_bars.to_string(),
            exit_label(t.exit_reason).to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity curve as CSV with `timestamp,balance` columns.
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "balance"])?;
    for point in curve {
        wtr.write_record([&point.timestamp.to_string(), &format!("{:.4}", point.balance)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

/// Pretty JSON for any serialisable artifact.
pub fn export_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize artifact to JSON")
}

/// Parse a backtest manifest, rejecting newer schema versions.
pub fn import_backtest_json(json: &str) -> Result<BacktestRun> {
    let run: BacktestRun =
        serde_json::from_str(json).context("failed to deserialize BacktestRun from JSON")?;
    if run.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            run.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(run)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `manifest.json`, `trades.csv` and `equity.csv` for a backtest into
/// a timestamped directory under `output_dir`, returning that directory.
pub fn write_backtest_artifacts(run: &BacktestRun, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("backtest_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_file(&run_dir.join("manifest.json"), &export_json(run)?)?;
    write_file(
        &run_dir.join("trades.csv"),
        &export_trades_csv(&run.result.trades)?,
    )?;
    write_file(
        &run_dir.join("equity.csv"),
        &export_equity_csv(&run.result.equity_curve)?,
    )?;

    tracing::info!(dir = %run_dir.display(), "wrote backtest artifacts");
    Ok(run_dir)
}

/// Write a walk-forward result as pretty JSON.
pub fn write_walk_forward_json(result: &WalkForwardResult, path: &Path) -> Result<()> {
    write_file(path, &export_json(result)?)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Text summary ───────────────────────────────────────────────────

/// Human-readable backtest summary.
pub fn format_summary(s: &BacktestSummary) -> String {
    let mut out = String::with_capacity(512);
    out.push_str("===== Backtest Summary =====\n");
    out.push_str(&format!("Initial balance:   {:.2}\n", s.initial_balance));
    out.push_str(&format!("Final balance:     {:.2}\n", s.final_balance));
    out.push_str(&format!(
        "Net PnL:           {:.2} ({:+.2}%)\n",
        s.net_pnl, s.return_pct
    ));
    out.push_str(&format!("Total trades:      {}\n", s.total_trades));
    out.push_str(&format!(
        "Long trades:       {} ({} winners)\n",
        s.long_trades, s.long_winners
    ));
    out.push_str(&format!(
        "Short trades:      {} ({} winners)\n",
        s.short_trades, s.short_winners
    ));
    out.push_str(&format!("Wins / losses:     {} / {}\n", s.wins, s.losses));
    out.push_str(&format!("Win rate:          {:.1}%\n", s.win_rate * 100.0));
    out.push_str(&format!("Profit factor:     {:.3}\n", s.profit_factor));
    out.push_str(&format!("Avg holding bars:  {:.1}\n", s.avg_holding_bars));
    out.push_str(&format!("Max drawdown:      {:.2}%\n", s.max_drawdown * 100.0));
    if s.residual_margin > 0.0 {
        out.push_str(&format!("Residual margin:   {:.2}\n", s.residual_margin));
    }
    out
}

/// One line per fold plus the unseen segment and the blended scores.
pub fn format_walk_forward(result: &WalkForwardResult, fitness: f64) -> String {
    let mut out = String::new();
    out.push_str("===== Walk-Forward =====\n");
    for fold in result.folds.iter().chain(result.unseen.as_ref()) {
        let status = if fold.is_failed() { "FAILED" } else { "ok" };
        out.push_str(&format!(
            "{:?} {:>3} [{:>6}..{:>6}) score {:>7.3} trades {:>4} conf {:.3} {}\n",
            fold.spec.kind,
            fold.spec.fold_index,
            fold.spec.test_start,
            fold.spec.test_end,
            fold.score,
            fold.trade_count,
            fold.confidence.mean,
            status
        ));
    }
    out.push_str(&format!(
        "Walk-forward PF: {:.4}\nUnseen PF:       {:.4}\nFitness:         {:.4}\n",
        result.walk_forward_score, result.unseen_score, fitness
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hedgelab_core::domain::PositionId;

    fn make_trade() -> Trade {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        Trade {
            id: PositionId(3),
            side: Side::Short,
            entry_time: t,
            entry_index: 1,
            entry_price: 100.0,
            size: 0.1,
            entry_atr: 1.0,
            confidence: 0.8,
            volatility_ratio: 0.01,
            margin: 0.5,
            exit_time: t,
            exit_index: 4,
            exit_price: 97.5,
            pnl_points: 2.5,
            pnl: 0.25,
            holding_bars: 3,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn trades_csv_has_header_and_rows() {
        let csv = export_trades_csv(&[make_trade(), make_trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,side,entry_time"));
        assert!(lines[1].starts_with("3,short,2024-01-02 09:30:00"));
        assert!(lines[1].ends_with(",3,take_profit"));
    }

    #[test]
    fn equity_csv_rows() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let curve = [
            EquityPoint {
                timestamp: t,
                balance: 1000.0,
            },
            EquityPoint {
                timestamp: t + chrono::Duration::hours(1),
                balance: 1002.5,
            },
        ];
        let csv = export_equity_csv(&curve).unwrap();
        assert_eq!(
            csv,
            "timestamp,balance\n2024-01-02 00:00:00,1000.0000\n2024-01-02 01:00:00,1002.5000\n"
        );
    }

    #[test]
    fn summary_text_mentions_key_figures() {
        let s = BacktestSummary {
            initial_balance: 1000.0,
            final_balance: 1010.0,
            net_pnl: 10.0,
            return_pct: 1.0,
            total_trades: 4,
            long_trades: 3,
            short_trades: 1,
            long_winners: 2,
            short_winners: 1,
            wins: 3,
            losses: 1,
            avg_holding_bars: 2.5,
            win_rate: 0.75,
            profit_factor: 4.0,
            max_drawdown: -0.01,
            residual_margin: 0.0,
        };
        let text = format_summary(&s);
        assert!(text.contains("Net PnL:           10.00 (+1.00%)"));
        assert!(text.contains("Long trades:       3 (2 winners)"));
        assert!(text.contains("Win rate:          75.0%"));
        assert!(!text.contains("Residual margin"));
    }

    #[test]
    fn walk_forward_text_lists_segments() {
        let result = WalkForwardResult {
            walk_forward_score: 1.5,
            unseen_score: 0.0,
            folds: Vec::new(),
            unseen: None,
        };
        let text = format_walk_forward(&result, 1.05);
        assert!(text.contains("Walk-forward PF: 1.5000"));
        assert!(text.contains("Fitness:         1.0500"));
    }

    #[test]
    fn walk_forward_json_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("wf.json");
        let result = WalkForwardResult {
            walk_forward_score: 0.0,
            unseen_score: 0.0,
            folds: Vec::new(),
            unseen: None,
        };
        write_walk_forward_json(&result, &path).unwrap();
        let back: WalkForwardResult =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, result);
    }
}
