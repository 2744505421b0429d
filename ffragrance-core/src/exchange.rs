//! Sectioned CSV interchange.
//!
//! One file holds every table. Each table starts with a marker line such as
//! `--- CHEMICALS ---`, then a header row and the data rows, and ends with a
//! blank line. Identifiers are written out so that importing an export
//! restores the same records and links.

use crate::{
    composition::{compute_line_metrics, validate_line, validate_quantities},
    error::FfragranceError,
    repository::{Library, Repository},
};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use ffragrance_schemas::{
    category::{Category, DEFAULT_CATEGORY_COLOR},
    chemical::{Chemical, PyramidNote, QuantityUnit},
    color::Rgba,
    formula::{Diluent, Formula, FormulaLine},
    tag::Tag,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Categories,
    Tags,
    Chemicals,
    ChemicalTags,
    Formulas,
    FormulaLines,
}

impl Section {
    const ALL: [Section; 6] = [
        Section::Categories,
        Section::Tags,
        Section::Chemicals,
        Section::ChemicalTags,
        Section::Formulas,
        Section::FormulaLines,
    ];

    fn title(&self) -> &'static str {
        match self {
            Section::Categories => "CATEGORIES",
            Section::Tags => "TAGS",
            Section::Chemicals => "CHEMICALS",
            Section::ChemicalTags => "CHEMICAL_TAGS",
            Section::Formulas => "FORMULAS",
            Section::FormulaLines => "FORMULA_LINES",
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            Section::Categories => &["id", "name", "color_hex"],
            Section::Tags => &["id", "name", "red", "green", "blue", "alpha"],
            Section::Chemicals => &[
                "id",
                "name",
                "cas_number",
                "ifra_limit",
                "notes",
                "pyramid_note",
                "unit",
                "quantity_grams",
                "quantity_ml",
                "dilution_percentage",
                "category_id",
            ],
            Section::ChemicalTags => &["chemical_id", "tag_id"],
            Section::Formulas => &[
                "id",
                "name",
                "smell_description",
                "diluent_type",
                "diluent_weight",
                "total_weight",
            ],
            Section::FormulaLines => &[
                "id",
                "formula_id",
                "chemical_id",
                "amount_grams",
                "dilution_percentage",
                "final_concentration",
            ],
        }
    }

    fn from_title(title: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|section| section.title() == title)
    }
}

/// Returns the title inside a `--- TITLE ---` marker.
fn parse_marker(field: &str) -> Option<&str> {
    field
        .trim()
        .strip_prefix("---")?
        .strip_suffix("---")
        .map(str::trim)
}

#[derive(Debug, Serialize, Deserialize)]
struct CategoryRow {
    id: Uuid,
    name: String,
    color_hex: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagRow {
    id: Uuid,
    name: String,
    red: f64,
    green: f64,
    blue: f64,
    alpha: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChemicalRow {
    id: Uuid,
    name: String,
    cas_number: String,
    ifra_limit: Option<f64>,
    notes: String,
    pyramid_note: String,
    unit: String,
    quantity_grams: Option<f64>,
    quantity_ml: Option<f64>,
    dilution_percentage: Option<f64>,
    category_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChemicalTagRow {
    chemical_id: Uuid,
    tag_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct FormulaRow {
    id: Uuid,
    name: String,
    smell_description: String,
    diluent_type: String,
    diluent_weight: f64,
    #[serde(default)]
    total_weight: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct FormulaLineRow {
    id: Uuid,
    formula_id: Uuid,
    chemical_id: Uuid,
    amount_grams: f64,
    dilution_percentage: f64,
    #[serde(default)]
    final_concentration: f64,
}

fn csv_error(section: Section) -> impl Fn(csv::Error) -> FfragranceError {
    move |source| FfragranceError::Csv(section.title().to_string(), source)
}

fn write_section<W, R>(
    out: &mut W,
    section: Section,
    rows: impl IntoIterator<Item = R>,
) -> Result<(), FfragranceError>
where
    W: Write,
    R: Serialize,
{
    writeln!(out, "--- {} ---", section.title())?;
    {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(&mut *out);
        writer.write_record(section.columns()).map_err(csv_error(section))?;
        for row in rows {
            writer.serialize(row).map_err(csv_error(section))?;
        }
        writer.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

/// Writes every table of the library in the sectioned format.
pub fn export_csv<W: Write>(library: &Library, mut out: W) -> Result<(), FfragranceError> {
    let chemicals = library.chemicals();
    let formulas = library.formulas();

    write_section(
        &mut out,
        Section::Categories,
        library.categories().into_iter().map(|category| CategoryRow {
            id: category.id,
            name: category.name.clone(),
            color_hex: category.color_hex.clone(),
        }),
    )?;

    write_section(
        &mut out,
        Section::Tags,
        library.tags().into_iter().map(|tag| TagRow {
            id: tag.id,
            name: tag.name.clone(),
            red: tag.red,
            green: tag.green,
            blue: tag.blue,
            alpha: tag.alpha,
        }),
    )?;

    write_section(
        &mut out,
        Section::Chemicals,
        chemicals.iter().map(|chemical| ChemicalRow {
            id: chemical.id,
            name: chemical.name.clone(),
            cas_number: chemical.cas_number.clone(),
            ifra_limit: chemical.ifra_safe_limit,
            notes: chemical.notes.clone(),
            pyramid_note: chemical.pyramid_note.to_string(),
            unit: chemical.unit.to_string(),
            quantity_grams: chemical.quantity_grams,
            quantity_ml: chemical.quantity_ml,
            dilution_percentage: chemical.dilution_percentage,
            category_id: chemical.category_id,
        }),
    )?;

    write_section(
        &mut out,
        Section::ChemicalTags,
        chemicals.iter().flat_map(|chemical| {
            chemical.tag_ids.iter().map(move |tag_id| ChemicalTagRow {
                chemical_id: chemical.id,
                tag_id: *tag_id,
            })
        }),
    )?;

    write_section(
        &mut out,
        Section::Formulas,
        formulas.iter().map(|formula| FormulaRow {
            id: formula.id,
            name: formula.name.clone(),
            smell_description: formula.smell_description.clone().unwrap_or_default(),
            diluent_type: formula.diluent.map(|d| d.label().to_string()).unwrap_or_default(),
            diluent_weight: formula.diluent_weight,
            total_weight: formula.total_formula_weight(),
        }),
    )?;

    write_section(
        &mut out,
        Section::FormulaLines,
        formulas.iter().flat_map(|formula| {
            compute_line_metrics(*formula, library)
                .into_iter()
                .map(move |line| FormulaLineRow {
                    id: line.line_id,
                    formula_id: formula.id,
                    chemical_id: line.chemical_id,
                    amount_grams: line.original_amount,
                    dilution_percentage: line.dilution_percentage,
                    final_concentration: line.final_concentration,
                })
        }),
    )?;

    out.flush()?;
    info!(
        chemicals = chemicals.len(),
        formulas = formulas.len(),
        "library exported"
    );
    Ok(())
}

/// What an import added or replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub tags: usize,
    pub chemicals: usize,
    pub chemical_tags: usize,
    pub formulas: usize,
    pub formula_lines: usize,
    /// Rows dropped because they point at records that do not exist, or
    /// carry a negative or non-finite weight or percentage.
    pub skipped: usize,
}

#[derive(Default)]
struct ParsedTables {
    categories: Vec<CategoryRow>,
    tags: Vec<TagRow>,
    chemicals: Vec<ChemicalRow>,
    chemical_tags: Vec<ChemicalTagRow>,
    formulas: Vec<FormulaRow>,
    formula_lines: Vec<FormulaLineRow>,
}

impl ParsedTables {
    fn push(&mut self, section: Section, record: &StringRecord, header: &StringRecord) -> Result<(), FfragranceError> {
        let to_err = csv_error(section);
        match section {
            Section::Categories => self.categories.push(record.deserialize(Some(header)).map_err(to_err)?),
            Section::Tags => self.tags.push(record.deserialize(Some(header)).map_err(to_err)?),
            Section::Chemicals => self.chemicals.push(record.deserialize(Some(header)).map_err(to_err)?),
            Section::ChemicalTags => self.chemical_tags.push(record.deserialize(Some(header)).map_err(to_err)?),
            Section::Formulas => self.formulas.push(record.deserialize(Some(header)).map_err(to_err)?),
            Section::FormulaLines => self.formula_lines.push(record.deserialize(Some(header)).map_err(to_err)?),
        }
        Ok(())
    }
}

fn parse_tables<R: Read>(input: R) -> Result<ParsedTables, FfragranceError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut tables = ParsedTables::default();
    // `None` while outside any known section.
    let mut section: Option<Section> = None;
    let mut header: Option<StringRecord> = None;

    for result in reader.records() {
        let record = result.map_err(|source| {
            let title = section.map_or("input", |s| s.title());
            FfragranceError::Csv(title.to_string(), source)
        })?;

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() == 1 {
            if let Some(title) = parse_marker(&record[0]) {
                section = Section::from_title(title);
                if section.is_none() {
                    warn!(section = title, "skipping unknown section");
                }
                header = None;
                continue;
            }
        }

        let Some(current) = section else {
            continue;
        };
        if let Some(columns) = &header {
            tables.push(current, &record, columns)?;
        } else {
            header = Some(record);
        }
    }
    Ok(tables)
}

fn skip(summary: &mut ImportSummary, what: &str, id: Uuid, reason: &str) {
    warn!(row = %id, reason, "skipping {what} row");
    summary.skipped += 1;
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn chemical_from_row(row: ChemicalRow, existing: Option<&Chemical>) -> Chemical {
    let pyramid_note = if row.pyramid_note.trim().is_empty() {
        PyramidNote::default()
    } else {
        row.pyramid_note.parse().unwrap_or_else(|err| {
            warn!(chemical = %row.name, "{err}, using top");
            PyramidNote::default()
        })
    };
    let unit = if row.unit.trim().is_empty() {
        QuantityUnit::default()
    } else {
        row.unit.parse().unwrap_or_else(|err| {
            warn!(chemical = %row.name, "{err}, using grams");
            QuantityUnit::default()
        })
    };

    Chemical {
        id: row.id,
        name: row.name,
        cas_number: row.cas_number,
        ifra_safe_limit: row.ifra_limit,
        notes: row.notes,
        pyramid_note,
        unit,
        quantity_grams: row.quantity_grams,
        quantity_ml: row.quantity_ml,
        dilution_percentage: row.dilution_percentage,
        structure_image: existing.and_then(|c| c.structure_image.clone()),
        category_id: row.category_id,
        tag_ids: existing.map(|c| c.tag_ids.clone()).unwrap_or_default(),
    }
}

fn formula_from_row(row: FormulaRow, existing: Option<&Formula>) -> Formula {
    let diluent = non_empty(row.diluent_type).and_then(|label| {
        label
            .parse::<Diluent>()
            .map_err(|err| warn!(formula = %row.name, "{err}, leaving diluent unset"))
            .ok()
    });

    Formula {
        id: row.id,
        name: row.name,
        smell_description: non_empty(row.smell_description),
        diluent,
        diluent_weight: row.diluent_weight,
        lines: existing.map(|f| f.lines.clone()).unwrap_or_default(),
    }
}

/// Reads the sectioned format and upserts its records into `library`,
/// keeping their identifiers. Derived columns are ignored.
pub fn import_csv<R: Read>(library: &mut Library, input: R) -> Result<ImportSummary, FfragranceError> {
    let tables = parse_tables(input)?;
    let mut summary = ImportSummary::default();

    for row in tables.categories {
        let color_hex = match Rgba::from_hex(&row.color_hex) {
            Ok(_) => row.color_hex,
            Err(err) => {
                warn!(category = %row.name, "{}, using {}", err, DEFAULT_CATEGORY_COLOR);
                DEFAULT_CATEGORY_COLOR.to_string()
            }
        };
        library.put(Category {
            id: row.id,
            name: row.name,
            color_hex,
        })?;
        summary.categories += 1;
    }

    for row in tables.tags {
        library.put(Tag {
            id: row.id,
            name: row.name,
            red: row.red,
            green: row.green,
            blue: row.blue,
            alpha: row.alpha,
        })?;
        summary.tags += 1;
    }

    for row in tables.chemicals {
        let row_id = row.id;
        if let Some(category_id) = row.category_id {
            if library.category(&category_id).is_none() {
                skip(&mut summary, "chemical", row_id, "unknown category");
                continue;
            }
        }
        let chemical = chemical_from_row(row, library.chemical(&row_id));
        library.put(chemical)?;
        summary.chemicals += 1;
    }

    for row in tables.chemical_tags {
        if library.tag(&row.tag_id).is_none() || library.chemical(&row.chemical_id).is_none() {
            skip(&mut summary, "chemical tag", row.chemical_id, "unknown chemical or tag");
            continue;
        }
        library.modify(&row.chemical_id, |chemical: &mut Chemical| {
            chemical.add_tag(row.tag_id);
            Ok(())
        })?;
        summary.chemical_tags += 1;
    }

    for row in tables.formulas {
        let row_id = row.id;
        let formula = formula_from_row(row, library.formula(&row_id));
        if let Err(err) = validate_quantities(&formula) {
            skip(&mut summary, "formula", row_id, &err.to_string());
            continue;
        }
        library.put(formula)?;
        summary.formulas += 1;
    }

    let mut lines_by_formula: HashMap<Uuid, Vec<FormulaLine>> = HashMap::new();
    for row in tables.formula_lines {
        if library.formula(&row.formula_id).is_none() {
            skip(&mut summary, "formula line", row.id, "unknown formula");
            continue;
        }
        if library.chemical(&row.chemical_id).is_none() {
            skip(&mut summary, "formula line", row.id, "unknown chemical");
            continue;
        }
        let line = FormulaLine {
            id: row.id,
            chemical_id: Some(row.chemical_id),
            amount_grams: row.amount_grams,
            dilution_percentage: row.dilution_percentage,
        };
        if let Err(err) = validate_line(&line) {
            skip(&mut summary, "formula line", row.id, &err.to_string());
            continue;
        }
        lines_by_formula.entry(row.formula_id).or_default().push(line);
    }
    for (formula_id, lines) in lines_by_formula {
        summary.formula_lines += lines.len();
        library.modify(&formula_id, |formula: &mut Formula| {
            for line in lines {
                match formula.lines.iter().position(|l| l.id == line.id) {
                    Some(index) => formula.lines[index] = line,
                    None => formula.lines.push(line),
                }
            }
            Ok(())
        })?;
    }

    info!(
        chemicals = summary.chemicals,
        formulas = summary.formulas,
        skipped = summary.skipped,
        "library imported"
    );
    Ok(summary)
}
