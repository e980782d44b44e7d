#![allow(non_snake_case)]
//! SEED creates the bot's sqlite database, applies the schema, and fills
//! the jokes table from files listed as arguments. All seed files must be
//! newline-delimited text, one joke per line.
//! Example usage: `SEED jokes.txt more-jokes.txt`
use anyhow::{Context, Result};
use dotenv::dotenv;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use BEEPBOOP::Store;

async fn seed_from_file(store: &Store, filename: &str) -> Result<u32> {
    let Ok(file) = File::open(filename) else {
        println!("Skipping {filename:?}; could not open file for reading.");
        return Ok(0);
    };

    let reader = BufReader::new(file);
    let mut count: u32 = 0;
    for line in reader.lines() {
        let text = line?;
        if text.trim().is_empty() {
            continue;
        }
        store.add_joke(&text).await?;
        count += 1;
    }

    println!("Added {count} jokes from {filename:#?}");
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let db_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/beepboop.db".to_string());
    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create {}", parent.display()))?;
        }
    }

    let store = Store::create(&db_path).await?;
    println!("Saving seed data to sqlite @ {db_path}");

    for f in std::env::args().skip(1) {
        seed_from_file(&store, &f).await?;
    }

    Ok(())
}
