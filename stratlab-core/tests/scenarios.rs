//! End-to-end scenarios through the full strategy pipeline.

use chrono::{Datelike, NaiveDate, Weekday};
use stratlab_core::domain::{Bar, ExitReason, PriceSeries, Signal, SignalSeries};
use stratlab_core::engine::{run_strategy, simulate, ExitRules};
use stratlab_core::indicators::Supertrend;
use stratlab_core::strategy::{BreakoutAtr, MaCrossover, SignalGenerator, Strategy};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn ohlc_series(data: &[(f64, f64, f64, f64)]) -> PriceSeries {
    let bars = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar::new(base_date() + chrono::Duration::days(i as i64), o, h, l, c))
        .collect();
    PriceSeries::new("TEST", bars).unwrap()
}

fn close_series(closes: &[f64]) -> PriceSeries {
    let data: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let o = if i == 0 { c } else { closes[i - 1] };
            (o, o.max(c) + 1.0, o.min(c) - 1.0, c)
        })
        .collect();
    ohlc_series(&data)
}

const QUIET: (f64, f64, f64, f64) = (100.0, 101.0, 99.0, 100.0);
const BREAKOUT: (f64, f64, f64, f64) = (100.0, 110.0, 99.0, 109.0);

// ── Scenario A: Breakout-ATR ─────────────────────────────────────────

#[test]
fn breakout_atr_enters_once_on_breakout_bar() {
    let mut data = vec![QUIET; 29];
    data.push(BREAKOUT);
    let series = ohlc_series(&data);
    let strategy = BreakoutAtr::default();

    let run = run_strategy(&series, &strategy).unwrap();

    assert_eq!(run.signals.len(), 30);
    assert_eq!(run.signals.count(Signal::Enter), 1);
    assert_eq!(run.signals.get(29), Signal::Enter);
    assert!(run.signals.as_slice()[..29].iter().all(|s| s.is_hold()));

    // Entry on the last bar: nothing left to exit on.
    assert_eq!(run.trades.len(), 1);
    assert!(run.trades[0].is_open());
    assert_eq!(run.trades[0].entry_price, 109.0);
}

#[test]
fn breakout_atr_places_levels_from_entry_atr() {
    let mut data = vec![QUIET; 25];
    data.push(BREAKOUT);
    data.extend(vec![(109.0, 110.0, 108.0, 109.0); 4]);
    let series = ohlc_series(&data);
    let strategy = BreakoutAtr::default();

    let run = run_strategy(&series, &strategy).unwrap();
    let atr = strategy.volatility(&run.indicators).unwrap()[25];
    let trade = &run.trades[0];

    assert_eq!(trade.entry_index, 25);
    let stop = trade.stop_loss.unwrap();
    let target = trade.take_profit.unwrap();
    assert!((stop - (109.0 - 1.5 * atr)).abs() < 1e-9);
    assert!((target - (109.0 + 2.0 * atr)).abs() < 1e-9);
    assert_eq!(trade.exit_reason, ExitReason::ForceClose);
    assert_eq!(trade.exit_index, Some(29));
}

#[test]
fn breakout_atr_stop_loss_exit() {
    let mut data = vec![QUIET; 25];
    data.push(BREAKOUT);
    data.push((109.0, 109.0, 95.0, 96.0));
    data.extend(vec![QUIET; 3]);
    let series = ohlc_series(&data);

    let run = run_strategy(&series, &BreakoutAtr::default()).unwrap();
    let trade = &run.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_index, Some(26));
    assert!(trade.realized_return.unwrap() < 0.0);
}

#[test]
fn breakout_atr_take_profit_exit() {
    let mut data = vec![QUIET; 25];
    data.push(BREAKOUT);
    data.push((109.0, 130.0, 109.0, 129.0));
    data.extend(vec![(129.0, 130.0, 128.0, 129.0); 3]);
    let series = ohlc_series(&data);

    let run = run_strategy(&series, &BreakoutAtr::default()).unwrap();
    assert_eq!(run.trades[0].exit_reason, ExitReason::TakeProfit);
    assert_eq!(run.trades[0].exit_index, Some(26));
}

// ── Scenario B: Dual-MA V shape ──────────────────────────────────────

#[test]
fn dual_ma_v_shape_yields_one_signal_reversal_trade() {
    let mut closes: Vec<f64> = (0..15).map(|i| 130.0 - 2.0 * i as f64).collect();
    closes.extend((1..15).map(|i| 102.0 + 3.0 * i as f64));
    closes.extend((1..15).map(|i| 144.0 - 3.0 * i as f64));
    let series = close_series(&closes);

    let run = run_strategy(&series, &Strategy::MaCrossover(MaCrossover::default())).unwrap();

    assert_eq!(run.signals.count(Signal::Enter), 1);
    assert_eq!(run.signals.count(Signal::Exit), 1);
    assert_eq!(run.trades.len(), 1);
    let trade = &run.trades[0];
    assert!(trade.is_closed());
    assert_eq!(trade.exit_reason, ExitReason::SignalReversal);
    assert!(trade.entry_index < trade.exit_index.unwrap());
}

#[test]
fn dual_ma_hold_variant_reports_unrealized() {
    let mut closes: Vec<f64> = (0..15).map(|i| 130.0 - 2.0 * i as f64).collect();
    closes.extend((1..15).map(|i| 102.0 + 3.0 * i as f64));
    let series = close_series(&closes);

    let hold = Strategy::default_for("ma_hold").unwrap();
    let run = run_strategy(&series, &hold).unwrap();

    assert_eq!(run.trades.len(), 1);
    let trade = &run.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::Open);
    assert_eq!(trade.exit_price, Some(*closes.last().unwrap()));
    assert!(trade.unrealized_return.unwrap() > 0.0);
    assert_eq!(trade.realized_return, None);
}

// ── Scenario D: SuperTrend ratchet ───────────────────────────────────

#[test]
fn supertrend_lower_band_never_decreases_in_uptrend() {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    closes.extend(vec![139.0; 20]);
    let series = close_series(&closes);

    let bands = Supertrend::new(10, 3.0).bands(series.bars());
    let bars = series.bars();
    for i in 1..bands.lower.len() {
        let close = bars[i].close;
        let inside = close <= bands.upper[i - 1] && close >= bands.lower[i - 1];
        if inside && bands.uptrend[i - 1] {
            assert!(
                bands.lower[i] >= bands.lower[i - 1],
                "lower band fell at bar {i}"
            );
        }
    }
    assert!(bands.uptrend.iter().all(|&up| up));
}

// ── Exit rules ───────────────────────────────────────────────────────

#[test]
fn time_stop_counts_calendar_days_across_weekend() {
    // Friday entry, five-day limit: Mon=3, Tue=4, Wed=5 days held.
    let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    assert_eq!(friday.weekday(), Weekday::Fri);
    let dates = [
        NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        friday,
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
    ];
    let bars = dates
        .iter()
        .map(|&d| Bar::new(d, 100.0, 101.0, 99.0, 100.0))
        .collect();
    let series = PriceSeries::new("WEEK", bars).unwrap();
    let signals = SignalSeries::from_vec(vec![
        Signal::Hold,
        Signal::Enter,
        Signal::Hold,
        Signal::Hold,
        Signal::Hold,
        Signal::Hold,
    ]);
    let rules = ExitRules {
        max_hold_days: Some(5),
        ..ExitRules::signal_only()
    };

    let trades = simulate(&series, &signals, &rules, None).unwrap();
    assert_eq!(trades[0].exit_reason, ExitReason::TimeStop);
    assert_eq!(trades[0].exit_date, Some(dates[4]));
}

#[test]
fn stop_loss_has_priority_over_exit_signal() {
    let series = close_series(&[100.0, 100.0, 100.0, 90.0]);
    let signals = SignalSeries::from_vec(vec![
        Signal::Hold,
        Signal::Enter,
        Signal::Hold,
        Signal::Exit,
    ]);
    let rules = ExitRules {
        stop_loss_multiplier: Some(1.0),
        ..ExitRules::signal_only()
    };
    let vol = vec![5.0; 4];
    let trades = simulate(&series, &signals, &rules, Some(&vol)).unwrap();
    assert_eq!(trades[0].exit_reason, ExitReason::StopLoss);
}

#[test]
fn every_strategy_handles_short_history() {
    let series = close_series(&[100.0, 101.0, 102.0]);
    for strategy in Strategy::all_defaults() {
        let run = run_strategy(&series, &strategy).unwrap();
        assert!(
            run.signals.iter().all(|s| s.is_hold()),
            "{} signalled without history",
            strategy.name()
        );
        assert!(run.trades.is_empty());
    }
}
