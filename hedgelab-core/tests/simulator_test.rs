//! End-to-end simulator scenarios.

use chrono::{NaiveDate, NaiveDateTime};
use hedgelab_core::domain::{Bar, Direction, ExitReason, Signal};
use hedgelab_core::engine::{simulate, BarSimulator, SimulationConfig};

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(15 * i as i64)
}

/// Close rises by exactly 1 per bar, ATR fixed at 1, half-point wicks.
fn rising_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            Bar {
                timestamp: ts(i),
                open: close - 0.5,
                high: close + 0.5,
                low: close - 0.5,
                close,
                atr: 1.0,
            }
        })
        .collect()
}

fn always(direction: Direction, n: usize) -> Vec<Signal> {
    vec![Signal::new(direction, 1.0); n]
}

fn roomy_config() -> SimulationConfig {
    SimulationConfig {
        sl_mult: 1.5,
        tp_mult: 2.5,
        initial_balance: 10_000.0,
        position_size: 1.0,
        conf_threshold: 0.5,
        vol_ratio_threshold: 0.0,
        contract_size: 1.0,
        leverage: 100.0,
        margin_limit: 1e9,
    }
}

#[test]
fn rising_market_with_constant_long_signal() {
    let n = 1000;
    let bars = rising_bars(n);
    let result = simulate(&bars, &always(Direction::Long, n), &roomy_config()).unwrap();

    // One position per bar 1..n, none rejected.
    assert_eq!(result.trades.len(), n - 1);
    assert_eq!(result.rejections.total(), 0);

    // Price only rises: every SL/TP exit is a take-profit, liquidations never lose.
    for trade in &result.trades {
        match trade.exit_reason {
            ExitReason::TakeProfit => {
                assert_eq!(trade.pnl, 2.5);
                assert_eq!(trade.holding_bars, 2);
            }
            ExitReason::EndOfData => assert!(trade.pnl >= 0.0),
            ExitReason::StopLoss => panic!("stop-loss hit in a rising market: {trade:?}"),
        }
    }
    let liquidated = result
        .trades
        .iter()
        .filter(|t| t.exit_reason == ExitReason::EndOfData)
        .count();
    assert_eq!(liquidated, 2);

    // One equity point per bar; flat until the first take-profit at bar 3,
    // then strictly increasing because one position closes on every bar.
    assert_eq!(result.equity_curve.len(), n);
    let balances: Vec<f64> = result.equity_curve.iter().map(|p| p.balance).collect();
    assert!(balances.windows(2).all(|w| w[1] >= w[0]));
    assert!(balances[2..].windows(2).all(|w| w[1] > w[0]));

    let losses = result.trades.iter().filter(|t| t.pnl < 0.0).count();
    assert_eq!(losses, 0);
}

#[test]
fn final_balance_equals_initial_plus_trade_pnl() {
    let n = 300;
    let bars: Vec<Bar> = (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.21).sin() * 6.0;
            Bar {
                timestamp: ts(i),
                open: close,
                high: close + 0.8,
                low: close - 0.8,
                close,
                atr: 1.1,
            }
        })
        .collect();
    let signals: Vec<Signal> = (0..n)
        .map(|i| match i % 3 {
            0 => Signal::new(Direction::Long, 0.9),
            1 => Signal::new(Direction::Short, 0.8),
            _ => Signal::new(Direction::Flat, 0.4),
        })
        .collect();

    let result = simulate(&bars, &signals, &roomy_config()).unwrap();
    let pnl: f64 = result.trades.iter().map(|t| t.pnl).sum();
    assert!((result.final_balance - (result.initial_balance + pnl)).abs() < 1e-6);
}

#[test]
fn equity_after_each_bar_matches_closed_trade_pnl() {
    let n = 120;
    let bars: Vec<Bar> = (0..n)
        .map(|i| {
            let close = 50.0 + (i as f64 * 0.4).cos() * 3.0;
            Bar {
                timestamp: ts(i),
                open: close,
                high: close + 0.6,
                low: close - 0.6,
                close,
                atr: 0.7,
            }
        })
        .collect();
    let signals = always(Direction::Short, n);
    let config = roomy_config();
    let result = simulate(&bars, &signals, &config).unwrap();

    for (i, point) in result.equity_curve.iter().enumerate() {
        let closed: f64 = result
            .trades
            .iter()
            .filter(|t| t.exit_reason != ExitReason::EndOfData && t.exit_index <= i)
            .map(|t| t.pnl)
            .sum();
        assert!(
            (point.balance - (config.initial_balance + closed)).abs() < 1e-6,
            "bar {i}: balance {} vs expected {}",
            point.balance,
            config.initial_balance + closed
        );
    }
}

#[test]
fn used_margin_tracks_open_positions_every_bar() {
    let n = 200;
    let bars: Vec<Bar> = (0..n)
        .map(|i| {
            let close = 20.0 + (i as f64 * 0.3).sin() * 2.0;
            Bar {
                timestamp: ts(i),
                open: close,
                high: close + 0.3,
                low: close - 0.3,
                close,
                atr: 0.4,
            }
        })
        .collect();
    let config = SimulationConfig {
        margin_limit: 0.01,
        leverage: 10.0,
        ..roomy_config()
    };

    let mut sim = BarSimulator::new(&config);
    sim.seed(&bars[0]);
    for (i, bar) in bars.iter().enumerate().skip(1) {
        let direction = if i % 2 == 0 {
            Direction::Long
        } else {
            Direction::Short
        };
        sim.step(i, bar, &Signal::new(direction, 1.0));

        let reserved: f64 = sim.open_positions().map(|p| p.margin).sum();
        assert!(sim.used_margin() >= 0.0);
        assert!((sim.used_margin() - reserved).abs() < 1e-9);
        assert!(sim.used_margin() <= sim.balance() * config.margin_limit + 1e-9);
    }
}

#[test]
fn tie_break_is_independent_of_ledger_order() {
    // Bars 1 and 2 open a long and a short; bar 3 spans both levels of both.
    let mut bars = rising_bars(4);
    for bar in bars.iter_mut().take(3) {
        bar.close = 100.0;
        bar.high = 100.1;
        bar.low = 99.9;
    }
    bars[3].close = 100.0;
    bars[3].high = 110.0;
    bars[3].low = 90.0;

    let config = roomy_config();
    let long_first = vec![
        Signal::flat(),
        Signal::new(Direction::Long, 1.0),
        Signal::new(Direction::Short, 1.0),
        Signal::flat(),
    ];
    let short_first = vec![
        Signal::flat(),
        Signal::new(Direction::Short, 1.0),
        Signal::new(Direction::Long, 1.0),
        Signal::flat(),
    ];

    for signals in [long_first, short_first] {
        let result = simulate(&bars, &signals, &config).unwrap();
        assert_eq!(result.trades.len(), 2);
        for trade in &result.trades {
            assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
            assert_eq!(trade.pnl, 2.5);
        }
        assert_eq!(result.final_balance, config.initial_balance + 5.0);
    }
}

#[test]
fn low_volatility_and_confidence_filters() {
    let n = 10;
    let bars = rising_bars(n);
    let config = SimulationConfig {
        conf_threshold: 0.6,
        vol_ratio_threshold: 0.5,
        ..roomy_config()
    };
    let result = simulate(&bars, &always(Direction::Long, n), &config).unwrap();
    assert!(result.trades.is_empty());
    assert_eq!(result.rejections.low_volatility, n - 1);

    let weak: Vec<Signal> = vec![Signal::new(Direction::Long, 0.59); n];
    let result = simulate(&bars, &weak, &roomy_config().with_thresholds(0.6, 0.0)).unwrap();
    assert!(result.trades.is_empty());
    assert_eq!(result.rejections.low_confidence, n - 1);
}
