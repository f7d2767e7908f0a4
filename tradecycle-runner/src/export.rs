//! Reporting and export: JSON, CSV and Markdown artifacts.
//!
//! - **JSON**: full `InstrumentResult` with schema versioning
//! - **CSV**: trade tape, action log, session equity, cross-instrument summary
//! - **Markdown**: human-readable single-instrument report
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradecycle_core::domain::{Action, TradeRecord};

use crate::replay::ReplayOutcome;
use crate::runner::{InstrumentResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &InstrumentResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize InstrumentResult to JSON")
}

/// Deserialize an `InstrumentResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<InstrumentResult> {
    let result: InstrumentResult =
        serde_json::from_str(json).context("failed to deserialize InstrumentResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: symbol, side, hedge, entry_time, entry_price, natr, adx,
/// exit_time, exit_price, exit_reason, quantity, pnl_per_share, net_pnl, return_pct
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "side",
        "hedge",
        "entry_time",
        "entry_price",
        "natr",
        "adx",
        "exit_time",
        "exit_price",
        "exit_reason",
        "quantity",
        "pnl_per_share",
        "net_pnl",
        "return_pct",
    ])?;
    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.side.to_string(),
            t.hedge.to_string(),
            t.entry_time.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.natr),
            format!("{:.2}", t.adx),
            t.exit_time.to_string(),
            format!("{:.4}", t.exit_price),
            t.exit_reason.to_string(),
            format!("{}", t.quantity),
            format!("{:.4}", t.pnl_per_share()),
            format!("{:.2}", t.net_pnl()),
            format!("{:.4}", t.return_pct()),
        ])?;
    }
    finish(wtr)
}

pub fn export_actions_csv(symbol: &str, actions: &[Action]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["symbol", "timestamp", "action", "price", "quantity", "reason"])?;
    for a in actions {
        wtr.write_record([
            symbol.to_string(),
            a.timestamp.to_string(),
            a.kind.to_string(),
            format!("{:.4}", a.price),
            format!("{}", a.quantity),
            a.reason.map(|r| r.to_string()).unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Session index and realized equity; row 0 is the starting capital.
pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["session", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{:.2}", eq)])?;
    }
    finish(wtr)
}

/// One row per instrument.
pub fn export_summary_csv(results: &[InstrumentResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "config_hash",
        "bars",
        "skipped_bars",
        "trades",
        "win_rate",
        "total_pnl",
        "total_return",
        "max_drawdown",
        "profit_factor",
    ])?;
    for r in results {
        wtr.write_record([
            r.symbol.clone(),
            r.fingerprint.config_hash.short().to_string(),
            r.stats.bars.to_string(),
            r.stats.skipped_bars.to_string(),
            r.summary.trade_count.to_string(),
            format!("{:.4}", r.summary.win_rate),
            format!("{:.2}", r.summary.total_pnl),
            format!("{:.6}", r.metrics.total_return),
            format!("{:.6}", r.metrics.max_drawdown),
            format!("{:.3}", r.metrics.profit_factor),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write(path: PathBuf, contents: &str) -> Result<()> {
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Save the artifact set for one instrument under
/// `{output_dir}/{symbol}_{config_hash}/`:
/// - `manifest.json`: the full `InstrumentResult`
/// - `trades.csv`, `actions.csv`, `equity.csv`
/// - `report.md`
pub fn save_artifacts(result: &InstrumentResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(format!(
        "{}_{}",
        result.symbol,
        result.fingerprint.config_hash.short()
    ));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write(run_dir.join("manifest.json"), &export_json(result)?)?;
    write(run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write(run_dir.join("actions.csv"), &export_actions_csv(&result.symbol, &result.actions)?)?;
    write(run_dir.join("equity.csv"), &export_equity_csv(&result.equity_curve)?)?;
    write(run_dir.join("report.md"), &generate_report(result))?;
    Ok(run_dir)
}

/// Save every instrument plus `summary.csv` at the top of `output_dir`.
pub fn save_run(results: &[InstrumentResult], output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let dirs = results
        .iter()
        .map(|r| save_artifacts(r, output_dir))
        .collect::<Result<Vec<_>>>()?;
    write(output_dir.join("summary.csv"), &export_summary_csv(results)?)?;
    Ok(dirs)
}

pub fn load_artifacts(dir: &Path) -> Result<InstrumentResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

/// `replay.json` plus one `{symbol}_trades.csv` per instrument.
pub fn save_replay(outcomes: &[ReplayOutcome], output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let json = serde_json::to_string_pretty(outcomes).context("failed to serialize replay outcomes")?;
    let path = output_dir.join("replay.json");
    write(path.clone(), &json)?;
    for outcome in outcomes {
        write(
            output_dir.join(format!("{}_trades.csv", outcome.symbol)),
            &export_trades_csv(&outcome.trades)?,
        )?;
    }
    Ok(path)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(result: &InstrumentResult) -> String {
    let fp = &result.fingerprint;
    let m = &result.metrics;
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# {} Backtest Report\n\n", result.symbol));

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    if let (Some(first), Some(last)) = (fp.first_bar, fp.last_bar) {
        md.push_str(&format!("| Period | {first} to {last} |\n"));
    }
    md.push_str(&format!(
        "| Bars | {} ({} warmup, {} skipped) |\n",
        fp.bar_count, result.warmup_bars, result.stats.skipped_bars
    ));
    md.push_str(&format!("| Config Hash | {} |\n", fp.config_hash.0));
    md.push_str(&format!("| Dataset Hash | {} |\n", fp.dataset_hash.0));
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total P&L | {:.2} |\n", result.summary.total_pnl));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!(
        "| Trades | {} ({} long, {} short, {} hedge) |\n",
        m.trade_count, m.long_trades, m.short_trades, m.hedge_trades
    ));
    md.push_str(&format!("| Avg Gain | {:.3}% |\n", result.summary.avg_gain_pct));
    md.push_str(&format!("| Avg Loss | {:.3}% |\n", result.summary.avg_loss_pct));
    md.push_str(&format!("| Stop Losses | {} |\n", m.stop_losses));
    md.push_str(&format!("| Avg Hold | {:.1} min |\n", m.avg_hold_minutes));
    md.push_str(&format!("| Max Consecutive Wins | {} |\n", m.max_consecutive_wins));
    md.push_str(&format!("| Max Consecutive Losses | {} |\n", m.max_consecutive_losses));
    md.push('\n');

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSection;
    use crate::data_loader::CsvMarketData;
    use crate::runner::run_with_bars;
    use crate::synthetic::minute_bars;
    use tradecycle_core::EngineConfig;

    fn sample_result() -> InstrumentResult {
        let mut cfg = EngineConfig {
            symbol: "SPY".into(),
            ..Default::default()
        };
        cfg.stochastic.rsi_period = 14;
        cfg.stochastic.k_period = 14;
        let bars = minute_bars("SPY", 4, 2);
        run_with_bars(&cfg, &bars, CsvMarketData::default(), &RunSection::default()).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let back = import_json(&export_json(&result).unwrap()).unwrap();
        assert_eq!(back.symbol, result.symbol);
        assert_eq!(back.actions, result.actions);
        assert_eq!(back.fingerprint, result.fingerprint);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn csv_columns() {
        let result = sample_result();
        let trades = export_trades_csv(&result.trades).unwrap();
        assert!(trades.starts_with("symbol,side,hedge,entry_time"));
        assert_eq!(trades.lines().count(), result.trades.len() + 1);

        let actions = export_actions_csv("SPY", &result.actions).unwrap();
        assert_eq!(actions.lines().count(), result.actions.len() + 1);

        let equity = export_equity_csv(&[10_000.0, 10_012.5]).unwrap();
        assert_eq!(equity, "session,equity\n0,10000.00\n1,10012.50\n");
    }

    #[test]
    fn report_has_sections() {
        let md = generate_report(&sample_result());
        assert!(md.contains("# SPY Backtest Report"));
        assert!(md.contains("## Metadata"));
        assert!(md.contains("## Performance Summary"));
        assert!(md.contains("Config Hash"));
    }

    #[test]
    fn save_and_load_run() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();
        let dirs = save_run(std::slice::from_ref(&result), dir.path()).unwrap();
        assert_eq!(dirs.len(), 1);
        for name in ["manifest.json", "trades.csv", "actions.csv", "equity.csv", "report.md"] {
            assert!(dirs[0].join(name).exists(), "{name} missing");
        }
        assert!(dir.path().join("summary.csv").exists());
        let loaded = load_artifacts(&dirs[0]).unwrap();
        assert_eq!(loaded.trades.len(), result.trades.len());
    }
}
