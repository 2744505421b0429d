//! Command handlers. Each one works on the loaded library and reports whether
//! it changed anything, so `main` knows to write the file back.

use crate::{
    plotting, report, CategoryCommand, ChemicalArgs, ChemicalCommand, Command, FormulaCommand,
    SortOrder, TagCommand,
};
use anyhow::{bail, ensure, Context, Result};
use ffragrance_core::{composition, exchange, inventory, Library, Repository};
use ffragrance_schemas::{
    category::{Category, DEFAULT_CATEGORY_COLOR},
    chemical::Chemical,
    color::Rgba,
    formula::Formula,
    tag::{Tag, DEFAULT_TAG_COLOR},
};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::PathBuf,
};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
}

pub fn run(command: Command, library: &mut Library) -> Result<Outcome> {
    match command {
        Command::Inventory { search, sort } => {
            let chemicals = inventory::search(library, search.as_deref().unwrap_or(""));
            report::write_inventory(&mut io::stdout().lock(), library, &chemicals, sort == SortOrder::Pyramid)?;
            Ok(Outcome::Unchanged)
        }
        Command::Category(command) => run_category(command, library),
        Command::Tag(command) => run_tag(command, library),
        Command::Chemical(command) => run_chemical(command, library),
        Command::Formula(command) => run_formula(command, library),
        Command::Export { out } => {
            let path = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "Ffragrance_Export_{}.csv",
                    chrono::Utc::now().format("%Y%m%d_%H%M%S")
                ))
            });
            let file = File::create(&path)
                .with_context(|| format!("Failed to create export file: {:?}", path))?;
            exchange::export_csv(library, BufWriter::new(file))
                .with_context(|| format!("Failed to export to {:?}", path))?;
            println!("Exported library to '{}'.", path.display());
            Ok(Outcome::Unchanged)
        }
        Command::Import { path } => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open import file: {:?}", path))?;
            let summary = exchange::import_csv(library, BufReader::new(file))
                .with_context(|| format!("Failed to import {:?}", path))?;
            println!(
                "Imported {} categories, {} tags, {} chemicals ({} tag links), {} formulas ({} lines).",
                summary.categories,
                summary.tags,
                summary.chemicals,
                summary.chemical_tags,
                summary.formulas,
                summary.formula_lines
            );
            if summary.skipped > 0 {
                println!("Skipped {} row(s) with unknown references or invalid quantities.", summary.skipped);
            }
            Ok(Outcome::Changed)
        }
    }
}

fn run_category(command: CategoryCommand, library: &mut Library) -> Result<Outcome> {
    match command {
        CategoryCommand::Add { name, color } => {
            let color = match color {
                Some(color) => color,
                None => Rgba::from_hex(DEFAULT_CATEGORY_COLOR)?,
            };
            let category = Category::new(name.trim(), color);
            let message = format!("Added category '{}' ({}).", category.name, category.color_hex);
            library.put(category)?;
            println!("{}", message);
            Ok(Outcome::Changed)
        }
        CategoryCommand::List => {
            let categories = library.categories();
            if categories.is_empty() {
                println!("No categories.");
            }
            for category in categories {
                println!(
                    "  - {:<24} {} | {} chemical(s)",
                    category.name,
                    category.color().to_hex(),
                    library.chemicals_in_category(&category.id).len()
                );
            }
            Ok(Outcome::Unchanged)
        }
        CategoryCommand::Delete { name } => {
            let id = library.find::<Category>(&name)?.id;
            let removed = Repository::<Category>::delete(library, &id)?;
            println!("Deleted category '{}'.", removed.name);
            Ok(Outcome::Changed)
        }
    }
}

fn run_tag(command: TagCommand, library: &mut Library) -> Result<Outcome> {
    match command {
        TagCommand::Add { name, color } => {
            let color = match color {
                Some(color) => color,
                None => Rgba::from_hex(DEFAULT_TAG_COLOR)?,
            };
            let tag = Tag::new(name.trim(), color);
            let message = format!("Added tag '{}' ({}).", tag.name, color.to_hex());
            library.put(tag)?;
            println!("{}", message);
            Ok(Outcome::Changed)
        }
        TagCommand::List => {
            let tags = library.tags();
            if tags.is_empty() {
                println!("No tags.");
            }
            for tag in tags {
                println!(
                    "  - {:<24} {} | {} chemical(s)",
                    tag.name,
                    tag.color().to_hex(),
                    library.chemicals_with_tag(&tag.id).len()
                );
            }
            Ok(Outcome::Unchanged)
        }
        TagCommand::Delete { name } => {
            let id = library.find::<Tag>(&name)?.id;
            let detached = library.chemicals_with_tag(&id).len();
            let removed = Repository::<Tag>::delete(library, &id)?;
            println!("Deleted tag '{}' (removed from {} chemical(s)).", removed.name, detached);
            Ok(Outcome::Changed)
        }
    }
}

fn ensure_amount(field: &str, value: Option<f64>) -> Result<Option<f64>> {
    if let Some(value) = value {
        ensure!(
            value.is_finite() && value >= 0.0,
            "{} must be a finite, non-negative number (got {})",
            field,
            value
        );
    }
    Ok(value)
}

fn build_chemical(args: ChemicalArgs, library: &Library) -> Result<Chemical> {
    let mut chemical = Chemical::new(args.name.trim()).with_pyramid_note(args.note);
    chemical.unit = args.unit;
    chemical.cas_number = args.cas.unwrap_or_default();
    chemical.notes = args.notes.unwrap_or_default();
    chemical.ifra_safe_limit = ensure_amount("--ifra-limit", args.ifra_limit)?;
    chemical.quantity_grams = ensure_amount("--grams", args.grams)?;
    chemical.quantity_ml = ensure_amount("--ml", args.ml)?;
    chemical.dilution_percentage = ensure_amount("--dilution", args.dilution)?;

    if let Some(category) = args.category {
        chemical.category_id = Some(library.find::<Category>(&category)?.id);
    }
    for tag in &args.tags {
        chemical.add_tag(library.find::<Tag>(tag)?.id);
    }
    if let Some(image) = args.image {
        let bytes = fs::read(&image)
            .with_context(|| format!("Failed to read structure image: {:?}", image))?;
        chemical.structure_image = Some(bytes);
    }
    Ok(chemical)
}

fn run_chemical(command: ChemicalCommand, library: &mut Library) -> Result<Outcome> {
    match command {
        ChemicalCommand::Add(args) => {
            let chemical = build_chemical(args, library)?;
            let message = format!("Added chemical '{}' ({}).", chemical.name, chemical.id);
            library.put(chemical)?;
            println!("{}", message);
            Ok(Outcome::Changed)
        }
        ChemicalCommand::Show { name } => {
            let chemical = library.find::<Chemical>(&name)?;
            report::write_chemical(&mut io::stdout().lock(), library, chemical)?;
            Ok(Outcome::Unchanged)
        }
        ChemicalCommand::Tag { name, tag } => {
            let chemical_id = library.find::<Chemical>(&name)?.id;
            let tag = library.find::<Tag>(&tag)?.clone();
            let linked = library.modify(&chemical_id, |chemical: &mut Chemical| Ok(chemical.add_tag(tag.id)))?;
            if !linked {
                println!("'{}' is already tagged '{}'.", name, tag.name);
                return Ok(Outcome::Unchanged);
            }
            println!("Tagged '{}' with '{}'.", name, tag.name);
            Ok(Outcome::Changed)
        }
        ChemicalCommand::Untag { name, tag } => {
            let chemical_id = library.find::<Chemical>(&name)?.id;
            let tag = library.find::<Tag>(&tag)?.clone();
            let unlinked =
                library.modify(&chemical_id, |chemical: &mut Chemical| Ok(chemical.remove_tag(tag.id)))?;
            if !unlinked {
                println!("'{}' is not tagged '{}'.", name, tag.name);
                return Ok(Outcome::Unchanged);
            }
            println!("Removed tag '{}' from '{}'.", tag.name, name);
            Ok(Outcome::Changed)
        }
        ChemicalCommand::Delete { name } => {
            let id = library.find::<Chemical>(&name)?.id;
            let removed = Repository::<Chemical>::delete(library, &id)?;
            println!("Deleted chemical '{}'.", removed.name);
            Ok(Outcome::Changed)
        }
    }
}

fn run_formula(command: FormulaCommand, library: &mut Library) -> Result<Outcome> {
    match command {
        FormulaCommand::New {
            name,
            description,
            diluent,
            diluent_weight,
        } => {
            let mut formula = Formula::new(name.trim());
            formula.smell_description = description;
            composition::set_diluent(&mut formula, diluent.and_then(|d| d.into_diluent()), diluent_weight)?;
            let message = format!("Created formula '{}' ({}).", formula.name, formula.id);
            library.put(formula)?;
            println!("{}", message);
            Ok(Outcome::Changed)
        }
        FormulaCommand::List => {
            report::write_formula_list(&mut io::stdout().lock(), library)?;
            Ok(Outcome::Unchanged)
        }
        FormulaCommand::Show { name, json } => {
            let formula = library.find::<Formula>(&name)?;
            if json {
                let summary = composition::summarize(formula, &*library);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                report::write_formula(&mut io::stdout().lock(), library, formula)?;
            }
            Ok(Outcome::Unchanged)
        }
        FormulaCommand::AddLine {
            formula,
            chemical,
            grams,
            dilution,
        } => {
            let chemical = library.find::<Chemical>(&chemical)?.clone();
            let formula_id = library.find::<Formula>(&formula)?.id;
            let dilution = dilution.unwrap_or_else(|| composition::default_dilution(&chemical));

            let preview = library
                .formula(&formula_id)
                .map(|formula| composition::preview_concentration(formula, grams, dilution))
                .unwrap_or_default();
            let line_id = library.modify(&formula_id, |formula: &mut Formula| {
                composition::add_line(formula, &chemical, grams, dilution).map(|line| line.id)
            })?;

            println!(
                "Added {:.3} g of '{}' at {:.2}% (line {}): {:.3}% of the formula.",
                grams, chemical.name, dilution, line_id, preview
            );
            if composition::exceeds_limit(preview, chemical.ifra_safe_limit) {
                println!(
                    "Warning: '{}' is above its IFRA safe limit of {:.2}%.",
                    chemical.name,
                    chemical.ifra_safe_limit.unwrap_or_default()
                );
            }
            Ok(Outcome::Changed)
        }
        FormulaCommand::EditLine {
            formula,
            line_id,
            grams,
            dilution,
        } => {
            let formula_id = library.find::<Formula>(&formula)?.id;
            let found = library.modify(&formula_id, |formula: &mut Formula| {
                composition::edit_line(formula, line_id, grams, dilution)
            })?;
            if !found {
                bail!("Formula '{}' has no line {}", formula, line_id);
            }
            println!("Updated line {}.", line_id);
            Ok(Outcome::Changed)
        }
        FormulaCommand::RemoveLine { formula, line_id } => {
            let formula_id = library.find::<Formula>(&formula)?.id;
            let removed = library.modify(&formula_id, |formula: &mut Formula| {
                Ok(composition::remove_line(formula, line_id))
            })?;
            if removed.is_none() {
                bail!("Formula '{}' has no line {}", formula, line_id);
            }
            println!("Removed line {}.", line_id);
            Ok(Outcome::Changed)
        }
        FormulaCommand::SetDiluent {
            formula,
            diluent,
            weight,
        } => {
            let formula_id = library.find::<Formula>(&formula)?.id;
            library.modify(&formula_id, |formula: &mut Formula| {
                composition::set_diluent(formula, diluent.and_then(|d| d.into_diluent()), weight)
            })?;
            println!("Set diluent of '{}' to {:.3} g.", formula, weight);
            Ok(Outcome::Changed)
        }
        FormulaCommand::Scale {
            formula,
            target_grams,
        } => {
            let formula_id = library.find::<Formula>(&formula)?.id;
            let factor = library.modify(&formula_id, |formula: &mut Formula| {
                composition::scale(formula, target_grams)
            })?;
            info!(formula = %formula, factor, "formula rescaled");
            println!("Scaled '{}' to {:.3} g (x{:.4}).", formula, target_grams, factor);
            Ok(Outcome::Changed)
        }
        FormulaCommand::Chart { formula, out } => {
            let formula = library.find::<Formula>(&formula)?;
            let path = out.unwrap_or_else(|| PathBuf::from(plotting::default_chart_path(&formula.name)));
            let summary = composition::summarize(formula, &*library);
            let entries = report::breakdown_entries(library, &summary);
            if plotting::plot_category_breakdown(&path, &formula.name, &entries)? {
                println!("Chart saved to '{}'.", path.display());
            } else {
                println!("'{}' has no ingredients to chart.", formula.name);
            }
            Ok(Outcome::Unchanged)
        }
        FormulaCommand::Delete { name } => {
            let id = library.find::<Formula>(&name)?.id;
            let removed = Repository::<Formula>::delete(library, &id)?;
            println!("Deleted formula '{}'.", removed.name);
            Ok(Outcome::Changed)
        }
    }
}
