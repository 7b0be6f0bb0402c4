use anyhow::Result;

fn main() -> Result<()> {
    isotask::cli::run()
}
