//! # Stages Subcommand
//!
//! Prints every edge of the application stage graph.

use anyhow::Result;
use clap::Args;
use serde_json::json;
use subsi_state::TRANSITIONS;

#[derive(Args, Debug)]
pub struct StagesArgs {
    /// Print as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn run_stages(args: &StagesArgs) -> Result<u8> {
    if args.json {
        let edges: Vec<_> = TRANSITIONS
            .iter()
            .map(|(from, outcome, to, guard)| json!({ "from": from, "outcome": outcome, "to": to, "guard": guard }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&edges)?);
        return Ok(0);
    }
    print!("{}", render_table());
    Ok(0)
}

pub fn render_table() -> String {
    let mut out = format!("{:<22} {:<20} {:<22} {}\n", "FROM", "OUTCOME", "TO", "REQUIRES");
    for (from, outcome, to, guard) in TRANSITIONS {
        out.push_str(&format!(
            "{:<22} {:<20} {:<22} {}\n",
            from.to_string(),
            outcome.to_string(),
            to.to_string(),
            guard
        ));
    }
    out
}
