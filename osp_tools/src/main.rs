//! Transaction seeder: fills the transactions table with realistic COMPLETED payment data so that
//! settlement runs have something to chew on.
use chrono::{Duration, Utc};
use clap::Parser;
use dotenvy::dotenv;
use log::info;
use osp_common::Cents;
use rand::Rng;
use settlement_engine::{
    db_types::{NewTransaction, TransactionStatus},
    pg::db_url,
    traits::SettlementLedger,
    PgDatabase,
};

#[derive(Parser, Debug)]
#[command(name = "osp-seeder", about = "Seed the transactions table with generated payment data")]
pub struct Arguments {
    /// Total number of transactions to insert
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    count: usize,
    /// Spread the transactions over the last DAYS days
    #[arg(short, long, default_value_t = 60)]
    days: i64,
    /// Number of distinct merchants
    #[arg(short, long, default_value_t = 10)]
    merchants: usize,
    /// Rows per INSERT statement
    #[arg(short, long, default_value_t = 1000)]
    batch_size: usize,
    /// Database URL (falls back to OSP_DATABASE_URL, then the default)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::new().parse_filters("info").init();
    let args = Arguments::parse();

    let url = args.database_url.clone().unwrap_or_else(db_url);
    let db = PgDatabase::new_with_url(&url, 5, 1).await?;
    db.migrate().await?;

    info!("🌱️ Seeding {} transactions across {} merchants over {} days", args.count, args.merchants, args.days);
    seed_transactions(&db, &args).await?;
    info!("🌱️ Seeding complete");
    Ok(())
}

async fn seed_transactions(db: &PgDatabase, args: &Arguments) -> anyhow::Result<()> {
    let merchants: Vec<String> = (1..=args.merchants).map(|i| format!("merchant_{i:03}")).collect();
    let end = Utc::now();
    let mut rng = rand::thread_rng();

    let mut inserted = 0usize;
    while inserted < args.count {
        let batch_size = args.batch_size.min(args.count - inserted);
        let batch: Vec<NewTransaction> = (0..batch_size)
            .map(|_| {
                let merchant_id = merchants[rng.gen_range(0..merchants.len())].clone();
                let paid_at = end
                    - Duration::days(rng.gen_range(0..args.days.max(1)))
                    - Duration::hours(rng.gen_range(0..24))
                    - Duration::minutes(rng.gen_range(0..60));
                // Amounts between $1 and $500; fees modelled as 2.9% + 30c.
                let amount = rng.gen_range(100..50_000i64);
                let fee = (amount as f64 * 0.029) as i64 + 30;
                NewTransaction {
                    merchant_id,
                    amount_cents: Cents::new(amount),
                    fee_cents: Cents::new(fee),
                    status: TransactionStatus::Completed,
                    paid_at,
                }
            })
            .collect();
        db.bulk_insert_transactions(&batch).await?;
        inserted += batch_size;
        if inserted % 10_000 == 0 {
            info!("🌱️ Seeded {inserted} transactions");
        }
    }
    Ok(())
}
