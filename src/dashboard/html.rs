//! Server-rendered HTML page.
//!
//! A single self-contained page: ranked pairs, failures and the paper
//! portfolio. It reloads itself every 60 seconds.

use std::fmt::Write;

use crate::engine::portfolio::PortfolioSnapshot;
use crate::types::{Action, ScanResult};

const REFRESH_SECS: u32 = 60;

/// Trades listed on the page.
pub const TRADES_SHOWN: usize = 15;

const STYLE: &str = "
body { font-family: ui-monospace, Menlo, monospace; margin: 2rem; }
body { background: #0d1117; color: #c9d1d9; }
h1 { color: #58a6ff; } h2 { color: #8b949e; border-bottom: 1px solid #30363d; }
table { border-collapse: collapse; margin-bottom: 1.5rem; }
th, td { padding: 0.25rem 0.75rem; text-align: right; border-bottom: 1px solid #21262d; }
th:first-child, td:first-child { text-align: left; }
.strong-buy { color: #3fb950; font-weight: bold; } .buy { color: #56d364; }
.hold { color: #8b949e; } .sell { color: #f0883e; } .avoid { color: #f85149; }
.muted { color: #6e7681; }
";

/// Escape text for HTML element and attribute content.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn action_class(action: Action) -> &'static str {
    match action {
        Action::StrongBuy => "strong-buy",
        Action::Buy => "buy",
        Action::Hold => "hold",
        Action::Sell => "sell",
        Action::Avoid => "avoid",
    }
}

fn opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}")).unwrap_or_else(|| "-".to_string())
}

pub fn render(
    scanner_name: &str,
    latest: Option<&ScanResult>,
    portfolio: Option<&PortfolioSnapshot>,
) -> String {
    // Writing into a String cannot fail
    let mut html = String::with_capacity(16 * 1024);
    let name = escape(scanner_name);

    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"{REFRESH_SECS}\">\
         <title>{name} Dashboard</title><style>{STYLE}</style></head><body>\
         <h1>{name} Dashboard</h1>"
    );

    match latest {
        None => html.push_str("<p class=\"muted\">Waiting for the first scan...</p>"),
        Some(scan) => render_scan(&mut html, scan),
    }

    if let Some(pf) = portfolio {
        render_portfolio(&mut html, pf);
    }

    html.push_str("</body></html>");
    html
}

fn render_scan(html: &mut String, scan: &ScanResult) {
    let _ = write!(
        html,
        "<p class=\"muted\">Scan {} at {} UTC, {} ms, {} scored, {} failed</p>",
        scan.scan_id,
        scan.timestamp.format("%Y-%m-%d %H:%M:%S"),
        scan.elapsed_ms,
        scan.scored.len(),
        scan.failures.len(),
    );

    html.push_str(
        "<h2>Ranking</h2><table><tr><th>#</th><th>Pair</th><th>Price</th><th>Score</th>\
         <th>Action</th><th>24h %</th><th>RSI</th><th>Vol ratio</th><th>Volatility %</th>\
         <th>Signals</th></tr>",
    );
    for (rank, asset) in scan.scored.iter().enumerate() {
        let ind = &asset.indicators;
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{:.6}</td><td>{}</td>\
             <td class=\"{}\">{}</td><td>{:+.2}</td><td>{}</td>\
             <td>{}</td><td>{:.2}</td><td>{}</td></tr>",
            rank + 1,
            escape(asset.pair.label()),
            asset.price,
            asset.score,
            action_class(asset.action),
            asset.action,
            ind.change_pct,
            opt(ind.rsi, 1),
            opt(ind.volume_ratio, 2),
            ind.volatility_pct,
            escape(&asset.triggered.join(", ")),
        );
    }
    html.push_str("</table>");

    if !scan.failures.is_empty() {
        html.push_str(
            "<h2>Failures</h2><table><tr><th>Pair</th><th>Reason</th><th>Detail</th></tr>",
        );
        for f in &scan.failures {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&f.pair.id),
                f.reason,
                escape(&f.detail),
            );
        }
        html.push_str("</table>");
    }
}

fn render_portfolio(html: &mut String, pf: &PortfolioSnapshot) {
    let _ = write!(
        html,
        "<h2>Paper portfolio</h2><p>Cash {:.2} | Equity {:.2} | Start {:.2} | \
         Realised P&amp;L {:+.2}</p>",
        pf.cash, pf.equity, pf.starting_cash, pf.realized_pnl,
    );

    if !pf.positions.is_empty() {
        html.push_str(
            "<table><tr><th>Pair</th><th>Qty</th><th>Entry</th><th>Price</th>\
             <th>Value</th><th>P&amp;L</th></tr>",
        );
        for p in &pf.positions {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td>\
                 <td>{}</td><td>{:.2}</td><td>{:+.2}</td></tr>",
                escape(p.pair.label()),
                p.quantity,
                p.entry_price,
                p.current_price,
                p.value,
                p.unrealized_pnl,
            );
        }
        html.push_str("</table>");
    }

    if !pf.recent_trades.is_empty() {
        html.push_str(
            "<h2>Recent trades</h2><table><tr><th>Time</th><th>Side</th><th>Pair</th>\
             <th>Price</th><th>Value</th><th>P&amp;L</th><th>Reason</th></tr>",
        );
        for t in pf.recent_trades.iter().rev() {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{:?}</td><td>{}</td><td>{}</td>\
                 <td>{:.2}</td><td>{}</td><td>{}</td></tr>",
                t.timestamp.format("%m-%d %H:%M"),
                t.side,
                escape(&t.pair_id),
                t.price,
                t.value,
                t.pnl.map(|p| format!("{p:+.2}")).unwrap_or_default(),
                escape(&t.reason),
            );
        }
        html.push_str("</table>");
    }
}
