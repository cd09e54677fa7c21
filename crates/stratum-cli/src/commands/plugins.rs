//! Plugins command - list registered plugins

use console::style;
use stratum_engine::Session;

use crate::error::Result;

pub fn run() -> Result<()> {
    let session = Session::builder().build();

    println!("{}", style("Registered plugins").bold());
    for entry in session.plugins().entries() {
        println!(
            "  {} {:<12} {}",
            style(format!("{:<56}", entry.id)).cyan(),
            entry.role,
            style(format!("({})", entry.source)).dim()
        );
    }

    Ok(())
}
