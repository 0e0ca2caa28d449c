//! Platform abstraction layer
//!
//! Browser bindings for a JS host that owns the canvas and the frame loop.
//! The host calls `tick` from `requestAnimationFrame` and draws from the
//! JSON snapshot it returns. Native builds use the library directly.

/// Seed from a wall-clock reading in ms, keeping the low 32 bits
pub fn seed_from_millis(ms: f64) -> u32 {
    (ms as u64) as u32
}

#[cfg(target_arch = "wasm32")]
mod web {
    use serde::Serialize;
    use wasm_bindgen::prelude::*;

    use crate::persistence::{self, LocalStore};
    use crate::settings::Settings;
    use crate::sim::{
        Ball, Board, GameState, Pattern, PowerUp, RiskProfile, SettlementEvent, Spacing, drop_armed,
        tick,
    };

    /// What the host needs to draw one frame
    #[derive(Serialize)]
    struct Frame<'a> {
        board: &'a Board,
        balls: &'a [Ball],
        events: &'a [SettlementEvent],
        balance: f64,
        streak: u32,
        bet: f64,
        auto_play: bool,
    }

    #[wasm_bindgen]
    pub struct WebPlinko {
        state: GameState,
        store: LocalStore,
        width: f32,
        height: f32,
    }

    #[wasm_bindgen]
    impl WebPlinko {
        #[wasm_bindgen(constructor)]
        pub fn new(width: f32, height: f32) -> Result<WebPlinko, JsValue> {
            console_error_panic_hook::set_once();
            let _ = console_log::init_with_level(log::Level::Info);

            let store = LocalStore;
            let mut settings = Settings::load(&store);
            if settings.seed.is_none() {
                settings.seed = Some(super::seed_from_millis(js_sys::Date::now()));
            }
            let session = persistence::load_session(&store, &settings);
            let spacing = Spacing::fit(width, height, session.rows);
            let state = GameState::new(settings, session, spacing)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            log::info!("Plinko ready ({width}x{height})");

            Ok(Self {
                state,
                store,
                width,
                height,
            })
        }

        /// Rebuild the board; unknown names fall back to defaults
        pub fn configure(&mut self, rows: u32, pattern: &str, risk: &str) -> Result<(), JsValue> {
            let spacing = Spacing::fit(self.width, self.height, rows);
            self.state
                .configure_board(rows, Pattern::parse(pattern), spacing)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            self.state.configure_risk(RiskProfile::parse(risk));
            self.save();
            Ok(())
        }

        pub fn resize(&mut self, width: f32, height: f32) -> Result<(), JsValue> {
            self.width = width;
            self.height = height;
            let (rows, pattern) = (self.state.session.rows, self.state.session.pattern);
            self.state
                .configure_board(rows, pattern, Spacing::fit(width, height, rows))
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            Ok(())
        }

        /// Toggle a power-up by name; returns whether it is now armed
        pub fn toggle_powerup(&mut self, name: &str) -> bool {
            match PowerUp::from_name(name) {
                Some(power) => self.state.toggle_powerup(power),
                None => {
                    log::warn!("Unknown power-up {name:?}");
                    false
                }
            }
        }

        /// Drop with the current bet; false when the balance is too low
        pub fn drop_ball(&mut self) -> bool {
            drop_armed(&mut self.state).is_ok()
        }

        pub fn set_bet(&mut self, bet: f64) {
            self.state.session.set_bet(bet);
        }

        pub fn halve_bet(&mut self) {
            self.state.session.halve_bet();
        }

        pub fn double_bet(&mut self) {
            self.state.session.double_bet();
        }

        pub fn set_auto_play(&mut self, enabled: bool) {
            self.state.set_auto_play(enabled);
        }

        pub fn set_ball_color(&mut self, color: &str) {
            self.state.set_ball_color(color);
            self.save();
        }

        pub fn reset(&mut self) -> Result<(), JsValue> {
            self.state
                .reset_session()
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            self.save();
            Ok(())
        }

        /// Advance by host frame time and return a JSON frame snapshot
        pub fn tick(&mut self, delta_ms: f64) -> String {
            let events = tick(&mut self.state, delta_ms);
            if !events.is_empty() {
                self.save();
            }
            let frame = Frame {
                board: &self.state.board,
                balls: &self.state.balls,
                events: &events,
                balance: self.state.session.balance,
                streak: self.state.session.streak,
                bet: self.state.session.bet,
                auto_play: self.state.auto_play,
            };
            serde_json::to_string(&frame).unwrap_or_else(|e| {
                log::error!("Frame serialization failed: {e}");
                String::from("{}")
            })
        }

        pub fn leaderboard(&self) -> String {
            serde_json::to_string(&self.state.session.leaderboard).unwrap_or_else(|_| "[]".into())
        }
    }

    impl WebPlinko {
        fn save(&self) {
            if let Err(e) = persistence::save_session(&self.store, &self.state.session) {
                log::warn!("Save failed: {e}");
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WebPlinko;
