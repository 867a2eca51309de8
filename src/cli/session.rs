//! Interactive conversion session.
//!
//! The session owns the engine and the favorites exclusively. Rate fetches
//! run as futures inside the same task; the loop waits on either the next
//! input line or the next finished fetch and applies whichever comes first.

use super::ui::{self, Theme};
use crate::core::config::AppConfig;
use crate::core::{
    ConversionEngine, CurrencyCode, Favorites, RateProvider, RateTable, RefreshOutcome,
    RefreshTicket,
};
use anyhow::{Result, anyhow};
use comfy_table::Cell;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

const HELP: &str = "\
Commands:
  amount <value>   set the amount to convert (a bare number works too)
  from <code>      set the source currency
  to <code>        set the target currency
  swap             swap currencies and amounts
  fav <code>       add or remove a favorite currency
  favs             list favorites
  theme            toggle light/dark output
  show             show conversion and comparison rates
  refresh          fetch rates again
  help             show this help
  quit             leave the session";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Amount(String),
    From(CurrencyCode),
    To(CurrencyCode),
    Swap,
    Favorite(CurrencyCode),
    Favorites,
    Theme,
    Show,
    Refresh,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let code = |what: &str| -> Result<CurrencyCode> {
        if rest.is_empty() {
            return Err(anyhow!("Usage: {word} <{what}>"));
        }
        rest.parse()
    };

    let command = match word.to_lowercase().as_str() {
        "amount" | "a" => Command::Amount(rest.to_string()),
        "from" => Command::From(code("currency")?),
        "to" => Command::To(code("currency")?),
        "swap" | "s" => Command::Swap,
        "fav" => Command::Favorite(code("currency")?),
        "favs" | "favorites" => Command::Favorites,
        "theme" => Command::Theme,
        "show" => Command::Show,
        "refresh" | "r" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ if word.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-') => {
            Command::Amount(line.to_string())
        }
        _ => return Err(anyhow!("Unknown command: {word}. Type 'help' for commands")),
    };
    Ok(Some(command))
}

type PendingRefresh = BoxFuture<'static, (RefreshTicket, Result<RateTable>)>;

pub struct Session {
    engine: ConversionEngine,
    favorites: Favorites,
    theme: Theme,
    currencies: Vec<CurrencyCode>,
}

impl Session {
    pub fn new(engine: ConversionEngine, currencies: Vec<CurrencyCode>) -> Self {
        Session {
            engine,
            favorites: Favorites::new(),
            theme: Theme::default(),
            currencies,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let engine = ConversionEngine::new(
            config.source_currency.clone(),
            config.target_currency.clone(),
            config.comparison_currencies.clone(),
        );
        Session::new(engine, config.currencies.clone())
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Runs until `quit` or end of input. At end of input, fetches still in
    /// flight are awaited so the final state is complete.
    pub async fn run<R, W>(
        &mut self,
        provider: Arc<dyn RateProvider>,
        input: R,
        out: &mut W,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        info!("Session started");
        writeln!(
            out,
            "{}",
            ui::style_text("Type 'help' for commands", ui::StyleType::Subtle)
        )?;

        let mut pending: FuturesUnordered<PendingRefresh> = FuturesUnordered::new();
        let mut lines = input.lines();
        let mut input_open = true;

        let ticket = self.engine.begin_refresh();
        pending.push(spawn_refresh(&provider, ticket));

        loop {
            if !input_open && pending.is_empty() {
                break;
            }

            tokio::select! {
                line = lines.next_line(), if input_open => {
                    let Some(line) = line? else {
                        debug!(pending = pending.len(), "Input closed");
                        input_open = false;
                        continue;
                    };
                    match parse_command(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => {
                            if let Some(ticket) = self.handle(command, out)? {
                                pending.push(spawn_refresh(&provider, ticket));
                            }
                        }
                        Ok(None) => {}
                        Err(e) => writeln!(
                            out,
                            "{}",
                            ui::style_text(&e.to_string(), ui::StyleType::Error)
                        )?,
                    }
                }
                Some((ticket, result)) = pending.next(), if !pending.is_empty() => {
                    self.finish_refresh(&ticket, result, out)?;
                }
            }
        }

        info!("Session ended");
        Ok(())
    }

    /// Applies one command. Returns the refresh it asked for, if any.
    pub fn handle<W: Write>(
        &mut self,
        command: Command,
        out: &mut W,
    ) -> Result<Option<RefreshTicket>> {
        let ticket = match command {
            Command::Amount(raw) => {
                self.engine.set_amount(&raw);
                writeln!(out, "{}", self.engine.display_summary())?;
                Some(self.engine.begin_refresh())
            }
            Command::From(code) => {
                self.warn_if_unlisted(&code, out)?;
                Some(self.engine.set_source_currency(code))
            }
            Command::To(code) => {
                self.warn_if_unlisted(&code, out)?;
                Some(self.engine.set_target_currency(code))
            }
            Command::Swap => {
                let ticket = self.engine.swap();
                writeln!(out, "{}", self.engine.display_summary())?;
                Some(ticket)
            }
            Command::Favorite(code) => {
                let added = self.favorites.toggle(&code);
                if added {
                    writeln!(out, "Added {code} to favorites")?;
                } else {
                    writeln!(out, "Removed {code} from favorites")?;
                }
                None
            }
            Command::Favorites => {
                writeln!(out, "{}", self.display_favorites())?;
                None
            }
            Command::Theme => {
                self.theme = self.theme.toggled();
                writeln!(out, "Theme: {}", self.theme.name())?;
                None
            }
            Command::Show => {
                writeln!(out, "{}", self.engine.display_as_table(self.theme))?;
                None
            }
            Command::Refresh => Some(self.engine.begin_refresh()),
            Command::Help => {
                writeln!(out, "{HELP}")?;
                None
            }
            Command::Quit => None,
        };
        Ok(ticket)
    }

    fn finish_refresh<W: Write>(
        &mut self,
        ticket: &RefreshTicket,
        result: Result<RateTable>,
        out: &mut W,
    ) -> Result<()> {
        match self.engine.apply_refresh(ticket, result) {
            RefreshOutcome::Applied => writeln!(out, "{}", self.engine.display_summary())?,
            RefreshOutcome::Stale => {}
            RefreshOutcome::Failed(_) => writeln!(
                out,
                "{}",
                ui::style_text(
                    &format!(
                        "Could not update {} rates, showing last known values",
                        ticket.base()
                    ),
                    ui::StyleType::Subtle
                )
            )?,
        }
        Ok(())
    }

    fn warn_if_unlisted<W: Write>(&self, code: &CurrencyCode, out: &mut W) -> Result<()> {
        if !self.currencies.is_empty() && !self.currencies.contains(code) {
            writeln!(
                out,
                "{}",
                ui::style_text(
                    &format!("{code} is not in the configured currency list"),
                    ui::StyleType::Subtle
                )
            )?;
        }
        Ok(())
    }

    pub fn display_favorites(&self) -> String {
        let mut table = ui::new_styled_table(self.theme);
        table.set_header(vec![ui::header_cell("Favorite Currencies", self.theme)]);
        for code in self.favorites.list() {
            table.add_row(vec![Cell::new(code)]);
        }

        let available: Vec<String> = self
            .currencies
            .iter()
            .map(|code| {
                if self.favorites.contains(code) {
                    format!("[{code}]")
                } else {
                    code.to_string()
                }
            })
            .collect();

        let mut output = if self.favorites.is_empty() {
            ui::style_text("No favorites yet", ui::StyleType::Subtle)
        } else {
            table.to_string()
        };
        if !available.is_empty() {
            output.push_str(&format!(
                "\n{} {}",
                ui::style_text("Available:", ui::StyleType::TotalLabel),
                available.join(" ")
            ));
        }
        output
    }
}

fn spawn_refresh(provider: &Arc<dyn RateProvider>, ticket: RefreshTicket) -> PendingRefresh {
    let provider = Arc::clone(provider);
    Box::pin(async move {
        let result = provider.fetch_rates(ticket.base()).await;
        (ticket, result)
    })
}
