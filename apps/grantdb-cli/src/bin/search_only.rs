use std::env;
use std::path::PathBuf;

use grantdb_core::Settings;
use grantdb_text::PatentIndex;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [index_dir]", args[0]);
        eprintln!("Example: {} 'title:battery AND assignee:acme' ./data/index", args[0]);
        std::process::exit(1);
    }
    let query_text = &args[1];
    let settings = Settings::load()?;
    let index_dir = args.get(2).map_or_else(|| settings.index_dir(), PathBuf::from);
    let index = PatentIndex::open(&index_dir)?.with_limits(settings.search.default_limit, settings.search.max_limit);
    let patents = index.search(query_text)?;
    println!("Found {} result(s) for \"{}\" in {}", patents.len(), query_text, index_dir.display());
    for (i, p) in patents.iter().enumerate() {
        println!("\n  {}. {}  {}", i + 1, p.number, p.title);
        println!("     issued {}  filed {}  class {}", p.issue_date, p.application_date, p.classification.symbol());
        println!("     inventors: {}", p.inventor_names.join(", "));
        println!("     assignee: {}  storage id: {}", p.assignee_name, p.storage_id);
    }
    Ok(())
}
