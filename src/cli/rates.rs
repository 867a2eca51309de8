use super::ui::{self, Theme};
use crate::core::conversion::format_rate;
use crate::core::{CurrencyCode, RateProvider, RateTable};
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment};

impl RateTable {
    /// All rates sorted by currency code, highlighting `highlighted` codes.
    pub fn display_as_table(&self, highlighted: &[CurrencyCode], theme: Theme) -> String {
        let mut table = ui::new_styled_table(theme);
        table.set_header(vec![
            ui::header_cell("Currency", theme),
            ui::header_cell(&format!("Rate (1 {})", self.base), theme),
        ]);

        let mut rates: Vec<(&String, &f64)> = self.rates.iter().collect();
        rates.sort_by(|a, b| a.0.cmp(b.0));

        for (code, rate) in rates {
            let rate_text = format_rate(*rate);
            let rate_cell = if highlighted.iter().any(|c| c == code.as_str()) {
                ui::highlight_cell(&rate_text, theme)
            } else {
                Cell::new(rate_text).set_alignment(CellAlignment::Right)
            };
            table.add_row(vec![Cell::new(code), rate_cell]);
        }

        let mut output = format!(
            "Exchange rates for {}\n\n",
            ui::style_text(self.base.as_str(), ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        if let Some(updated) = self.updated_at {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Updated {}", updated.format("%Y-%m-%d %H:%M UTC")),
                    ui::StyleType::Subtle
                )
            ));
        }
        output
    }
}

/// Prints the full rate table for `base`.
pub async fn run(
    provider: &(dyn RateProvider + Send + Sync),
    base: &CurrencyCode,
    highlighted: &[CurrencyCode],
) -> Result<()> {
    let pb = ui::new_spinner(&format!("Fetching {base} exchange rates..."));
    let result = provider.fetch_rates(base).await;
    pb.finish_and_clear();

    let table = result.with_context(|| format!("Failed to fetch exchange rates for {base}"))?;
    println!("{}", table.display_as_table(highlighted, Theme::default()));
    Ok(())
}
