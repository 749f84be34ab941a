//! Human-readable rendering of the aggregated annex table.
//!
//! Thirteen columns matching the annex layout: source country and nature
//! code, realisation date and value, acquisition date and value, expenses,
//! paid taxes and the counter country, with a SUM footer. Header labels
//! come in English or Portuguese.

use anexoj_core::Aggregator;
use chrono::Datelike;
use clap::ValueEnum;
use isocountry::CountryCode;
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::{self, Write};

/// Language of the table header labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Language {
    /// English labels.
    En,
    /// Portuguese labels.
    Pt,
}

struct Labels {
    realisation: &'static str,
    acquisition: &'static str,
    source_country: &'static str,
    code: &'static str,
    year: &'static str,
    month: &'static str,
    day: &'static str,
    value: &'static str,
    expenses: &'static str,
    paid_taxes: &'static str,
    counter_country: &'static str,
    sum: &'static str,
}

const EN: Labels = Labels {
    realisation: "Realisation",
    acquisition: "Acquisition",
    source_country: "Source Country",
    code: "Code",
    year: "Year",
    month: "Month",
    day: "Day",
    value: "Value",
    expenses: "Expenses",
    paid_taxes: "Paid Taxes",
    counter_country: "Counter Country",
    sum: "SUM",
};

const PT: Labels = Labels {
    realisation: "Realização",
    acquisition: "Aquisição",
    source_country: "País da fonte",
    code: "Código",
    year: "Ano",
    month: "Mês",
    day: "Dia",
    value: "Valor",
    expenses: "Despesas",
    paid_taxes: "Imposto pago",
    counter_country: "País da contraparte",
    sum: "SOMA",
};

impl Language {
    const fn labels(self) -> &'static Labels {
        match self {
            Self::En => &EN,
            Self::Pt => &PT,
        }
    }
}

const COLUMNS: usize = 13;
const SEPARATOR: &str = "  ";

/// Money columns and date columns read better right-aligned.
const RIGHT_ALIGNED: [bool; COLUMNS] = [
    false, false, true, true, true, true, true, true, true, true, true, true, false,
];

/// Write the aggregated report as the annex table.
pub fn render<W: Write>(mut writer: W, aggregator: &Aggregator, language: Language) -> io::Result<()> {
    let labels = language.labels();

    let headers: [String; COLUMNS] = [
        labels.source_country.to_string(),
        labels.code.to_string(),
        labels.year.to_string(),
        labels.month.to_string(),
        labels.day.to_string(),
        labels.value.to_string(),
        labels.year.to_string(),
        labels.month.to_string(),
        labels.day.to_string(),
        labels.value.to_string(),
        labels.expenses.to_string(),
        labels.paid_taxes.to_string(),
        labels.counter_country.to_string(),
    ];

    let rows: Vec<[String; COLUMNS]> = aggregator
        .items()
        .iter()
        .map(|item| {
            [
                country(item.asset_country),
                item.nature.to_string(),
                item.sell_timestamp.year().to_string(),
                item.sell_timestamp.month().to_string(),
                item.sell_timestamp.day().to_string(),
                money(item.sell_value),
                item.buy_timestamp.year().to_string(),
                item.buy_timestamp.month().to_string(),
                item.buy_timestamp.day().to_string(),
                money(item.buy_value),
                money(item.fees),
                money(item.taxes),
                country(item.broker_country),
            ]
        })
        .collect();

    let footer: [String; COLUMNS] = [
        labels.sum.to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        money(aggregator.total_earned()),
        String::new(),
        String::new(),
        String::new(),
        money(aggregator.total_spent()),
        money(aggregator.total_fees()),
        money(aggregator.total_taxes()),
        String::new(),
    ];

    let mut widths: [usize; COLUMNS] = [0; COLUMNS];
    for (index, header) in headers.iter().enumerate() {
        widths[index] = display_width(header);
    }
    for row in rows.iter().chain(std::iter::once(&footer)) {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(display_width(cell));
        }
    }

    write_group_header(&mut writer, labels, &widths)?;
    write_row(&mut writer, &headers, &widths)?;
    write_rule(&mut writer, &widths)?;
    for row in &rows {
        write_row(&mut writer, row, &widths)?;
    }
    write_rule(&mut writer, &widths)?;
    write_row(&mut writer, &footer, &widths)?;

    Ok(())
}

/// The realisation and acquisition groups each span their four date and
/// value columns.
fn write_group_header<W: Write>(
    writer: &mut W,
    labels: &Labels,
    widths: &[usize; COLUMNS],
) -> io::Result<()> {
    let span =
        |from: usize| widths[from..from + 4].iter().sum::<usize>() + SEPARATOR.len() * 3;

    let line = format!(
        "{}{}{}{}{}{}{}",
        " ".repeat(widths[0]),
        SEPARATOR,
        " ".repeat(widths[1]),
        SEPARATOR,
        pad(labels.realisation, span(2), false),
        SEPARATOR,
        pad(labels.acquisition, span(6), false),
    );
    writeln!(writer, "{}", line.trim_end())
}

fn write_row<W: Write>(
    writer: &mut W,
    row: &[String; COLUMNS],
    widths: &[usize; COLUMNS],
) -> io::Result<()> {
    let cells: Vec<String> = row
        .iter()
        .enumerate()
        .map(|(index, cell)| pad(cell, widths[index], RIGHT_ALIGNED[index]))
        .collect();
    writeln!(writer, "{}", cells.join(SEPARATOR).trim_end())
}

fn write_rule<W: Write>(writer: &mut W, widths: &[usize; COLUMNS]) -> io::Result<()> {
    let total = widths.iter().sum::<usize>() + SEPARATOR.len() * (COLUMNS - 1);
    writeln!(writer, "{}", "-".repeat(total))
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let padding = width.saturating_sub(display_width(text));
    if right_align {
        format!("{}{text}", " ".repeat(padding))
    } else {
        format!("{text}{}", " ".repeat(padding))
    }
}

fn display_width(text: &str) -> usize {
    text.chars().count()
}

fn money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2} €")
}

fn country(code: u32) -> String {
    CountryCode::for_id(code).map_or_else(
        |_| code.to_string(),
        |country| format!("{code} - {}", country.name()),
    )
}
