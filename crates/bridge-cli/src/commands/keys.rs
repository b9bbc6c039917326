//! Keys command implementation

use bridge_spec::{advice, keys};
use colored::Colorize;
use serde_json::json;

use crate::error::Result;

/// Print the reserved spec keys and advice groups
pub fn run_keys(as_json: bool) -> Result<()> {
    if as_json {
        let listing = json!({
            "keys": keys::all(),
            "advice_groups": advice::standard_groups(),
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}:", "Reserved keys".bold());
    for key in keys::all() {
        println!("  {}", key.cyan());
    }
    println!();
    println!("{}:", "Advice groups".bold());
    for group in advice::standard_groups() {
        println!("  {}", group.cyan());
    }
    Ok(())
}
