#![doc = include_str!("../README.md")]

use {
    anyhow::{Context as _, Result, bail},
    ascii_table::AsciiTable,
    bytes::Bytes,
    directories::ProjectDirs,
    std::{path::PathBuf, time::Instant},
    tapdict::{
        DictionaryId, Engine,
        config::Config,
        deinflect::Identity,
        markup::Document,
        rank::{DictionaryEntry, EntrySource},
        resolve::{NoLayout, Tap},
        tap::LookupOutput,
    },
    tokio::fs,
    tracing::{info, level_filters::LevelFilter},
    tracing_subscriber::EnvFilter,
};

#[derive(Debug, clap::Parser)]
struct Args {
    /// Path to the dictionary database
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// Path to a JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// View and manage dictionaries
    #[command(alias = "dict")]
    Dictionary {
        #[command(subcommand)]
        command: DictionaryCommand,
    },
    /// Look up the text starting at some character offset
    Lookup {
        /// Text to look up in
        text: String,
        /// Character offset to start the lookup at
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print the full output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Tap on a text run of some markup and look up what was tapped
    Tap {
        /// Markup fragment, e.g. `<ruby>漢字<rt>かんじ</rt></ruby>です`
        markup: String,
        /// Text of the run to tap on; defaults to the first run
        #[arg(long)]
        run: Option<String>,
        /// Character offset within the run
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print the full output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, clap::Parser)]
enum DictionaryCommand {
    /// List all dictionaries
    Ls,
    /// Get info on a specific dictionary
    Info {
        /// Dictionary ID
        id: String,
    },
    /// Import a Yomitan dictionary archive from the filesystem
    Import {
        /// Path to the dictionary archive
        path: PathBuf,
    },
    /// Delete a dictionary with the given ID
    Rm {
        /// Dictionary ID
        id: String,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .without_time()
        .init();
    let args = <Args as clap::Parser>::parse();

    let config = if let Some(path) = &args.config {
        let config = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config at {path:?}"))?;
        serde_json::from_str::<Config>(&config)
            .with_context(|| format!("failed to parse config at {path:?}"))?
    } else {
        Config::default()
    };

    let db_path = if let Some(db_path) = args.db_path {
        db_path
    } else {
        let dirs = ProjectDirs::from("io.github", "tapdict", "tapdict")
            .context("failed to get default app directories")?;
        fs::create_dir_all(dirs.data_dir())
            .await
            .context("failed to create data directory")?;
        dirs.data_dir().join("tapdict.db")
    };
    info!("Using {db_path:?} as database path");

    let engine = Engine::new(db_path, config, Identity)
        .await
        .context("failed to create engine")?;

    match args.command {
        Command::Dictionary {
            command: DictionaryCommand::Ls,
        } => dictionary_ls(&engine),
        Command::Dictionary {
            command: DictionaryCommand::Info { id },
        } => dictionary_info(&engine, id)?,
        Command::Dictionary {
            command: DictionaryCommand::Import { path },
        } => dictionary_import(&engine, path).await?,
        Command::Dictionary {
            command: DictionaryCommand::Rm { id },
        } => dictionary_rm(&engine, id).await?,
        Command::Lookup { text, offset, json } => lookup(&engine, &text, offset, json).await?,
        Command::Tap {
            markup,
            run,
            offset,
            json,
        } => tap(&engine, &markup, run.as_deref(), offset, json).await?,
    }

    Ok(())
}

fn all_sources(engine: &Engine) -> Vec<DictionaryId> {
    engine.dictionaries().keys().cloned().collect()
}

fn dictionary_ls(engine: &Engine) {
    let mut table = AsciiTable::default();
    table.column(0).set_header("ID");
    table.column(1).set_header("Title");
    table.column(2).set_header("Revision");
    table.column(3).set_header("Names");

    let dictionaries = engine.dictionaries();
    let data = dictionaries
        .values()
        .map(|dictionary| {
            let names = dictionaries.is_proper_name(&dictionary.id, engine.config());
            vec![
                dictionary.id.to_string(),
                dictionary.title.clone(),
                dictionary.revision.clone(),
                (if names { "✔" } else { "" }).to_owned(),
            ]
        })
        .collect::<Vec<_>>();
    table.print(&data);
}

fn dictionary_info(engine: &Engine, id: String) -> Result<()> {
    let id = DictionaryId(id);
    let dictionaries = engine.dictionaries();
    let Some(dictionary) = dictionaries.get(&id) else {
        bail!("no dictionary with ID {id:?}");
    };
    println!("{:?} revision {:?}", dictionary.title, dictionary.revision);
    println!(
        "  ID {} | Imported {}",
        dictionary.id,
        dictionary.created_at.as_deref().unwrap_or("?")
    );

    for (label, value) in [
        ("Author", &dictionary.author),
        ("URL", &dictionary.url),
        ("Attribution", &dictionary.attribution),
    ] {
        if let Some(value) = value {
            println!("  {label}: {value}");
        }
    }

    if let Some(description) = &dictionary.description {
        if !description.trim().is_empty() {
            println!();
            println!("--- Description ---");
            println!();
            println!("{description}");
        }
    }
    Ok(())
}

async fn dictionary_import(engine: &Engine, path: PathBuf) -> Result<()> {
    let start = Instant::now();

    let data = fs::read(&path)
        .await
        .map(Bytes::from)
        .context("failed to read dictionary file into memory")?;
    info!("Importing {path:?}");

    let report = engine
        .import_yomitan(data)
        .await
        .context("failed to import dictionary")?;

    let elapsed = Instant::now().duration_since(start);
    info!(
        "Import complete in {elapsed:?}: {} terms ({} skipped), {} tags, {} meta",
        report.terms_inserted, report.terms_skipped, report.tags_inserted, report.meta_inserted
    );
    Ok(())
}

async fn dictionary_rm(engine: &Engine, id: String) -> Result<()> {
    let id = DictionaryId(id);
    engine
        .remove_dictionary(&id)
        .await
        .with_context(|| format!("failed to remove {id:?}"))?;
    Ok(())
}

async fn lookup(engine: &Engine, text: &str, offset: usize, json: bool) -> Result<()> {
    let entries = engine.lookup(text, offset, &all_sources(engine)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries(&entries);
    }
    Ok(())
}

async fn tap(
    engine: &Engine,
    markup: &str,
    run: Option<&str>,
    offset: usize,
    json: bool,
) -> Result<()> {
    let doc = Document::parse(markup).context("failed to parse markup")?;
    let node = doc
        .descendants(doc.root())
        .find(|&id| {
            doc.text(id)
                .is_some_and(|text| run.is_none_or(|run| text == run))
        })
        .with_context(|| format!("no text run matching {run:?}"))?;

    let event = engine.tap_event(&doc, Tap::Position { node, offset }, &NoLayout);
    let output = engine.lookup_tap(&event, &all_sources(engine)).await;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "event": event,
                "output": output,
            }))?
        );
    } else {
        print_tap(&event.full_text, event.absolute_offset, event.reading.as_deref(), &output);
    }
    Ok(())
}

fn print_tap(full_text: &str, offset: usize, reading: Option<&str>, output: &LookupOutput) {
    let tapped = full_text.chars().nth(offset).unwrap_or(' ');
    println!("Tapped {tapped:?} at offset {offset} of {full_text:?}");
    if let Some(reading) = reading {
        println!("  Reading: {reading}");
    }
    println!("  Sentence: {}", output.sentence);
    let characters = output
        .characters
        .iter()
        .map(|picked| {
            if picked.offset == offset {
                format!("[{}]", picked.character)
            } else {
                picked.character.to_string()
            }
        })
        .collect::<String>();
    println!("  Around: {characters}");
    println!();
    print_entries(&output.entries);
}

fn print_entries(entries: &[DictionaryEntry]) {
    if entries.is_empty() {
        println!("No entries found");
        return;
    }
    for entry in entries {
        let source = match &entry.source {
            EntrySource::Dictionary(id) => id.to_string(),
            EntrySource::Merged => "merged".to_owned(),
        };
        println!("{} [{}] ({source})", entry.term, entry.reading);
        if let Some(frequency) = &entry.frequency {
            println!("  frequency: {frequency}");
        }
        for group in &entry.groups {
            println!("  {}:", group.source);
            for meaning in &group.meanings {
                println!("    - {meaning}");
            }
        }
    }
}
