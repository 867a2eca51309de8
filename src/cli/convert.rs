use super::ui::{self, Theme};
use crate::core::conversion::format_rate;
use crate::core::{ConversionEngine, RateProvider, RefreshOutcome};
use anyhow::{Result, bail};
use comfy_table::{Cell, CellAlignment};

impl ConversionEngine {
    /// One line summary, e.g. `10 USD = 830.00 INR (1 USD = 83.00 INR)`.
    pub fn display_summary(&self) -> String {
        let converted = self.converted_amount().unwrap_or("N/A");
        let amount = if self.amount().trim().is_empty() {
            "-"
        } else {
            self.amount().trim()
        };
        let rate = if self.has_rates() {
            format_rate(self.exchange_rate())
        } else {
            "N/A".to_string()
        };
        format!(
            "{} {} = {} {} (1 {} = {} {})",
            amount,
            self.source(),
            converted,
            self.target(),
            self.source(),
            rate,
            self.target()
        )
    }

    pub fn display_as_table(&self, theme: Theme) -> String {
        let mut table = ui::new_styled_table(theme);
        table.set_header(vec![
            ui::header_cell("From", theme),
            ui::header_cell("Amount", theme),
            ui::header_cell("To", theme),
            ui::header_cell("Converted", theme),
            ui::header_cell("Rate", theme),
        ]);

        let rate = self.has_rates().then(|| self.exchange_rate());
        let converted = match self.converted_amount() {
            Some(value) => ui::highlight_cell(value, theme),
            None => ui::format_optional_cell(None::<String>, |v| v),
        };
        table.add_row(vec![
            Cell::new(self.source()),
            Cell::new(self.amount()).set_alignment(CellAlignment::Right),
            Cell::new(self.target()),
            converted,
            ui::format_optional_cell(rate, format_rate),
        ]);

        let mut output = format!(
            "Convert {} to {}\n\n",
            ui::style_text(self.source().as_str(), ui::StyleType::Title),
            ui::style_text(self.target().as_str(), ui::StyleType::Title)
        );
        output.push_str(&table.to_string());

        if !self.comparison_rates().is_empty() {
            let mut comparison = ui::new_styled_table(theme);
            comparison.set_header(vec![
                ui::header_cell("Currency", theme),
                ui::header_cell(&format!("Rate (1 {})", self.source()), theme),
            ]);
            for (code, rate) in self.comparison_rates() {
                comparison.add_row(vec![
                    Cell::new(code),
                    Cell::new(format_rate(*rate)).set_alignment(CellAlignment::Right),
                ]);
            }
            output.push_str(&format!(
                "\n\n{}\n",
                ui::style_text("Comparison Rates", ui::StyleType::TotalLabel)
            ));
            output.push_str(&comparison.to_string());
        }

        if let Some(updated) = self.last_updated() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Rates updated {}", updated.format("%Y-%m-%d %H:%M UTC")),
                    ui::StyleType::Subtle
                )
            ));
        }

        output
    }
}

/// Converts `amount` once and prints the result.
pub async fn run(
    engine: &mut ConversionEngine,
    provider: &(dyn RateProvider + Send + Sync),
    amount: &str,
) -> Result<()> {
    engine.set_amount(amount);

    let pb = ui::new_spinner("Fetching exchange rates...");
    let outcome = engine.refresh_rates(provider).await;
    pb.finish_and_clear();

    if let RefreshOutcome::Failed(reason) = outcome {
        bail!("Failed to fetch exchange rates: {reason}");
    }

    if engine.converted_amount().is_none() {
        println!(
            "{}",
            ui::style_text(
                &format!("'{amount}' is not a number"),
                ui::StyleType::Error
            )
        );
    }
    println!("{}", engine.display_as_table(Theme::default()));
    Ok(())
}
