//! Plinko headless runner
//!
//! Native builds drop a batch of balls on a configured board and report the
//! results. The browser build is driven through `platform::WebPlinko`.
//!
//! Usage: `plinko-sim [rows] [pattern] [risk] [drops] [seed]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();

    if let Err(e) = native::run(std::env::args().skip(1).collect()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::WebPlinko, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use plinko_sim::consts::STEP_MS;
    use plinko_sim::persistence::{self, FileStore};
    use plinko_sim::session::DEFAULT_ROWS;
    use plinko_sim::settings::Settings;
    use plinko_sim::sim::{GameState, Pattern, PowerUps, RiskProfile, Spacing, tick, try_drop};

    /// Give up on balls that haven't landed after this much simulated time
    const MAX_SIM_MS: f64 = 120_000.0;

    pub fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
        let rows = args.first().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_ROWS);
        let pattern = args.get(1).map(|s| Pattern::parse(s)).unwrap_or_default();
        let risk = args.get(2).map(|s| RiskProfile::parse(s)).unwrap_or_default();
        let drops: u32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);

        let store = FileStore::new(".plinko");
        let mut settings = Settings::load(&store);
        if let Some(seed) = args.get(4).and_then(|s| s.parse().ok()) {
            settings.seed = Some(seed);
        }
        let session = persistence::load_session(&store, &settings);

        log::info!("Plinko (native) starting...");
        let mut state = GameState::new(settings, session, Spacing::default())?;
        state.configure_board(rows, pattern, Spacing::default())?;
        let table = state.configure_risk(risk).to_vec();
        println!(
            "{} rows, {} pattern, {} risk, expected return {:.4}",
            rows,
            pattern.as_str(),
            risk.as_str(),
            state.table.expected_return()
        );
        println!("multipliers: {table:?}");

        let start_balance = state.session.balance;
        let mut landed = 0u32;
        for _ in 0..drops {
            let bet = state.session.bet;
            if let Err(e) = try_drop(&mut state, bet, PowerUps::NONE) {
                println!("stopped: {e}");
                break;
            }
            // One drop per frame
            landed += tick(&mut state, STEP_MS).len() as u32;
        }
        while state.falling_count() > 0 && state.clock_ms < MAX_SIM_MS {
            landed += tick(&mut state, STEP_MS).len() as u32;
        }

        println!(
            "{landed} balls landed, balance {:.2} -> {:.2}",
            start_balance, state.session.balance
        );
        println!("leaderboard:");
        for (i, entry) in state.session.leaderboard.entries.iter().enumerate() {
            println!("{:>3}. {entry}", i + 1);
        }

        persistence::save_session(&store, &state.session)?;
        Ok(())
    }
}
