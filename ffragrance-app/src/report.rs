//! Plain-text reports written to stdout by the read-only commands.

use ffragrance_core::{
    composition::{self, CategoryKey, FormulaSummary},
    inventory, Library,
};
use ffragrance_schemas::{chemical::Chemical, color::Rgba, formula::Formula};
use std::io::{self, Write};

/// One bar of the category breakdown, already resolved to a label and colour.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownEntry {
    pub label: String,
    pub color: Rgba,
    pub share: f64,
}

/// Resolves the category buckets of `summary` to names and colours, sorted by
/// name with Uncategorized last.
pub fn breakdown_entries(library: &Library, summary: &FormulaSummary) -> Vec<BreakdownEntry> {
    let mut entries: Vec<(bool, BreakdownEntry)> = composition::aggregate_by_category(&summary.lines)
        .into_iter()
        .map(|(key, share)| {
            let category = match key {
                CategoryKey::Category(id) => library.category(&id),
                CategoryKey::Uncategorized => None,
            };
            let entry = match category {
                Some(category) => BreakdownEntry {
                    label: category.name.clone(),
                    color: category.color(),
                    share,
                },
                None => BreakdownEntry {
                    label: "Uncategorized".to_string(),
                    color: Rgba::GRAY,
                    share,
                },
            };
            (category.is_none(), entry)
        })
        .collect();

    entries.sort_by(|(a_loose, a), (b_loose, b)| {
        a_loose
            .cmp(b_loose)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
    });
    entries.into_iter().map(|(_, entry)| entry).collect()
}

fn fmt_limit(limit: Option<f64>) -> String {
    limit.map_or_else(|| "-".to_string(), |limit| format!("{:.2}%", limit))
}

pub fn write_formula<W: Write>(out: &mut W, library: &Library, formula: &Formula) -> io::Result<()> {
    let summary = composition::summarize(formula, library);

    writeln!(out, "--- Formula: {} ---", formula.name)?;
    if let Some(description) = formula.smell_description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(out, "Smells like: {}", description)?;
    }
    let diluent = formula.diluent.map_or("none", |d| d.label());
    writeln!(
        out,
        "Diluent: {} ({:.3} g) | Lines: {:.3} g | Total: {:.3} g",
        diluent, summary.diluent_weight, summary.total_line_weight, summary.total_formula_weight
    )?;
    writeln!(out, "========================================")?;

    if summary.lines.is_empty() {
        writeln!(out, "  (no ingredients)")?;
    }
    for line in &summary.lines {
        writeln!(
            out,
            "  {} | {:<28} | {:>9.3} g @ {:>6.2}% | final {:>7.3}% | IFRA {:>8}{}",
            line.line_id,
            line.chemical_name,
            line.original_amount,
            line.dilution_percentage,
            line.final_concentration,
            fmt_limit(line.ifra_safe_limit),
            if line.is_over_limit { "  OVER LIMIT" } else { "" }
        )?;
    }
    let unresolved = formula.lines.len() - summary.lines.len();
    if unresolved > 0 {
        writeln!(out, "  ({} line(s) reference a missing chemical)", unresolved)?;
    }

    let breakdown = breakdown_entries(library, &summary);
    if !breakdown.is_empty() {
        writeln!(out, "\nComposition by category:")?;
        for entry in &breakdown {
            writeln!(out, "  - {:<24} {:>7.3}%", entry.label, entry.share)?;
        }
    }

    if summary.over_limit_count > 0 {
        writeln!(
            out,
            "\nWarning: {} line(s) exceed their IFRA safe limit.",
            summary.over_limit_count
        )?;
    }
    Ok(())
}

pub fn write_formula_list<W: Write>(out: &mut W, library: &Library) -> io::Result<()> {
    let formulas = library.formulas();
    if formulas.is_empty() {
        return writeln!(out, "No formulas.");
    }
    for formula in formulas {
        let summary = composition::summarize(formula, library);
        writeln!(
            out,
            "  - {:<28} | {:>3} line(s) | {:>10.3} g{}",
            formula.name,
            formula.lines.len(),
            summary.total_formula_weight,
            if summary.over_limit_count > 0 { "  OVER LIMIT" } else { "" }
        )?;
    }
    Ok(())
}

fn write_chemical_row<W: Write>(out: &mut W, library: &Library, chemical: &Chemical) -> io::Result<()> {
    let category = chemical
        .category_id
        .and_then(|id| library.category(&id))
        .map_or("-", |category| category.name.as_str());
    let on_hand = chemical
        .on_hand()
        .map_or_else(|| "-".to_string(), |qty| format!("{:.2} {}", qty, chemical.unit.symbol()));
    let tags: Vec<&str> = library.tags_of(chemical).iter().map(|tag| tag.name.as_str()).collect();

    writeln!(
        out,
        "  - {:<28} | CAS {:<12} | {:<16} | {:>12} | IFRA {:>8}{}",
        chemical.name,
        if chemical.cas_number.is_empty() { "-" } else { chemical.cas_number.as_str() },
        category,
        on_hand,
        fmt_limit(chemical.ifra_safe_limit),
        if tags.is_empty() { String::new() } else { format!(" | {}", tags.join(", ")) }
    )
}

/// Lists `chemicals`, either flat by name or grouped under pyramid headings.
pub fn write_inventory<W: Write>(
    out: &mut W,
    library: &Library,
    chemicals: &[&Chemical],
    by_pyramid: bool,
) -> io::Result<()> {
    if chemicals.is_empty() {
        return writeln!(out, "No chemicals.");
    }
    if !by_pyramid {
        for chemical in chemicals {
            write_chemical_row(out, library, chemical)?;
        }
        return Ok(());
    }
    for (note, group) in inventory::group_by_pyramid_note(chemicals) {
        writeln!(out, "{} ({})", note, group.len())?;
        for chemical in group {
            write_chemical_row(out, library, chemical)?;
        }
    }
    Ok(())
}

pub fn write_chemical<W: Write>(out: &mut W, library: &Library, chemical: &Chemical) -> io::Result<()> {
    writeln!(out, "--- Chemical: {} ---", chemical.name)?;
    writeln!(out, "Id: {}", chemical.id)?;
    if !chemical.cas_number.is_empty() {
        writeln!(out, "CAS: {}", chemical.cas_number)?;
    }
    writeln!(out, "Pyramid note: {}", chemical.pyramid_note)?;
    if let Some(category) = chemical.category_id.and_then(|id| library.category(&id)) {
        writeln!(out, "Category: {} ({})", category.name, category.color().to_hex())?;
    }
    let tags: Vec<&str> = library.tags_of(chemical).iter().map(|tag| tag.name.as_str()).collect();
    if !tags.is_empty() {
        writeln!(out, "Tags: {}", tags.join(", "))?;
    }
    writeln!(out, "IFRA safe limit: {}", fmt_limit(chemical.ifra_safe_limit))?;
    if let Some(dilution) = chemical.dilution_percentage {
        writeln!(out, "Stock dilution: {:.2}%", dilution)?;
    }
    if let Some(grams) = chemical.quantity_grams {
        writeln!(out, "On hand: {:.2} g", grams)?;
    }
    if let Some(ml) = chemical.quantity_ml {
        writeln!(out, "On hand: {:.2} ml", ml)?;
    }
    if !chemical.notes.is_empty() {
        writeln!(out, "Notes: {}", chemical.notes)?;
    }

    let formulas = library.formulas_using_chemical(&chemical.id);
    if !formulas.is_empty() {
        let names: Vec<&str> = formulas.iter().map(|formula| formula.name.as_str()).collect();
        writeln!(out, "Used in: {}", names.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffragrance_core::Repository;
    use ffragrance_schemas::{category::Category, chemical::PyramidNote, formula::Diluent};

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn sample() -> (Library, Formula) {
        let mut library = Library::new();
        let citrus = Category::new("Citrus", Rgba::from_hex("#FFA500").unwrap());
        let bergamot = Chemical::new("Bergamot Oil")
            .with_ifra_safe_limit(2.0)
            .with_category(citrus.id);
        let iso_e = Chemical::new("Iso E Super").with_pyramid_note(PyramidNote::Base);

        let mut formula = Formula::new("Cologne").with_diluent(Some(Diluent::PerfumersAlcohol), 80.0);
        composition::add_line(&mut formula, &bergamot, 5.0, 100.0).unwrap();
        composition::add_line(&mut formula, &iso_e, 15.0, 100.0).unwrap();

        library.put(citrus).unwrap();
        library.put(bergamot).unwrap();
        library.put(iso_e).unwrap();
        library.put(formula.clone()).unwrap();
        (library, formula)
    }

    #[test]
    fn test_breakdown_puts_uncategorized_last() {
        let (library, formula) = sample();
        let summary = composition::summarize(&formula, &library);
        let entries = breakdown_entries(&library, &summary);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "Citrus");
        assert_eq!(entries[0].color.to_hex(), "#FFA500");
        assert_eq!(entries[1].label, "Uncategorized");
        assert_eq!(entries[1].color, Rgba::GRAY);
        assert!((entries[1].share - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_formula_report_flags_over_limit_lines() {
        let (library, formula) = sample();
        let text = render(|out| write_formula(out, &library, &formula));

        assert!(text.contains("--- Formula: Cologne ---"));
        assert!(text.contains("Total: 100.000 g"));
        let bergamot_row = text.lines().find(|l| l.contains("Bergamot Oil")).unwrap();
        assert!(bergamot_row.ends_with("OVER LIMIT"));
        assert!(text.contains("1 line(s) exceed"));
    }

    #[test]
    fn test_inventory_groups_by_pyramid() {
        let (library, _) = sample();
        let text = render(|out| write_inventory(out, &library, &library.chemicals(), true));
        let headings: Vec<&str> = text.lines().filter(|l| !l.starts_with("  ")).collect();
        assert_eq!(headings, vec!["top (1)", "base (1)"]);
    }

    #[test]
    fn test_chemical_report_lists_formulas() {
        let (library, _) = sample();
        let bergamot = library.find::<Chemical>("bergamot oil").unwrap();
        let text = render(|out| write_chemical(out, &library, bergamot));
        assert!(text.contains("Category: Citrus (#FFA500)"));
        assert!(text.contains("Used in: Cologne"));
    }
}
