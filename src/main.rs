use anyhow::Result;
use chi_forms::{logging, ui};

fn main() -> Result<()> {
    logging::init()?;
    ui::run()
}
