use std::fmt;

use chrono::{DateTime, Utc};
use recall_core::model::{Card, CardId, Deck, DeckId, UserId, UserSettings};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    deck_id: DeckId,
    deck_name: String,
    deck_desc: Option<String>,
    cards: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDeckId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidCards { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidDeckId { raw } => write!(f, "invalid --deck-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCards { raw } => write!(f, "invalid --cards value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("RECALL_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_id = std::env::var("RECALL_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);
        let mut deck_id = std::env::var("RECALL_DECK_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| DeckId::new(1), DeckId::new);
        let mut deck_name = std::env::var("RECALL_DECK_NAME").unwrap_or_else(|_| "Spanish".into());
        let mut deck_desc = std::env::var("RECALL_DECK_DESC").ok();
        let mut cards = std::env::var("RECALL_CARDS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(8);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = UserId::new(parsed);
                }
                "--deck-id" => {
                    let value = require_value(&mut args, "--deck-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDeckId { raw: value.clone() })?;
                    deck_id = DeckId::new(parsed);
                }
                "--deck-name" => {
                    deck_name = require_value(&mut args, "--deck-name")?;
                }
                "--deck-desc" => {
                    deck_desc = Some(require_value(&mut args, "--deck-desc")?);
                }
                "--cards" => {
                    let value = require_value(&mut args, "--cards")?;
                    cards = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCards { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            deck_id,
            deck_name,
            deck_desc,
            cards,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user-id <id>            Owner user id (default: 1)");
    eprintln!("  --deck-id <id>            Deck id to upsert (default: 1)");
    eprintln!("  --deck-name <name>        Deck name (default: Spanish)");
    eprintln!("  --deck-desc <text>        Optional deck description");
    eprintln!("  --cards <n>               Number of sample cards to upsert (default: 8)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  RECALL_DB_URL, RECALL_USER_ID, RECALL_DECK_ID, RECALL_DECK_NAME, RECALL_DECK_DESC, RECALL_CARDS"
    );
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let deck = Deck::new(
        args.deck_id,
        args.user_id,
        args.deck_name.clone(),
        args.deck_desc.clone(),
        now,
    )?;
    storage.decks.upsert_deck(&deck).await?;

    let samples = [
        ("hello", "hola", Some("vocabulary")),
        ("thank you", "gracias", Some("vocabulary")),
        ("please", "por favor", Some("vocabulary")),
        ("goodbye", "adiós", Some("vocabulary")),
        ("Where is the station?", "¿Dónde está la estación?", Some("travel")),
        ("How much does it cost?", "¿Cuánto cuesta?", Some("travel")),
        ("I would like a coffee", "Quisiera un café", Some("travel")),
        ("good morning", "buenos días", Some("vocabulary")),
    ];
    for i in 0..args.cards {
        let idx = (i as usize) % samples.len();
        let (front, back, skill) = samples[idx];
        let card = Card::new(
            CardId::new(u64::from(i + 1)),
            deck.id(),
            front,
            back,
            None,
            skill.map(str::to_owned),
            now,
        )?;
        storage.cards.upsert_card(&card).await?;
    }

    if storage.settings.get_settings(args.user_id).await?.is_none() {
        let settings = UserSettings::default_for(args.user_id, now);
        storage.settings.save_settings(&settings).await?;
    }

    println!(
        "Seeded deck {} ({} cards) for user {} into {}",
        deck.id().value(),
        args.cards,
        args.user_id.value(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
