use ffragrance_core::{
    composition::{self, CategoryKey},
    exchange, FfragranceError, Library, Repository,
};
use ffragrance_schemas::{
    category::Category,
    chemical::Chemical,
    color::Rgba,
    formula::{Diluent, Formula},
};
use uuid::Uuid;

fn relative_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

/// Library holding one chemical and a 90 g diluent formula with one 10 g line.
fn perfume(dilution: f64) -> (Library, Uuid, Uuid) {
    let mut library = Library::new();
    let florals = Category::new("Florals", Rgba::opaque(1.0, 0.4, 0.7));
    let rose = Chemical::new("Phenylethyl Alcohol")
        .with_cas_number("60-12-8")
        .with_ifra_safe_limit(10.0)
        .with_category(florals.id);

    let mut formula = Formula::new("Rose Soliflore").with_diluent(Some(Diluent::PerfumersAlcohol), 90.0);
    composition::add_line(&mut formula, &rose, 10.0, dilution).unwrap();

    let ids = (rose.id, formula.id);
    library.put(florals).unwrap();
    library.put(rose).unwrap();
    library.put(formula).unwrap();
    (library, ids.0, ids.1)
}

#[test]
fn neat_line_is_ten_percent_and_scales_to_double() {
    let (mut library, _, formula_id) = perfume(100.0);

    let formula = library.formula(&formula_id).unwrap();
    assert_eq!(formula.total_formula_weight(), 100.0);
    let lines = composition::compute_line_metrics(formula, &library);
    assert!(relative_eq(lines[0].final_concentration, 10.0));
    assert!(!lines[0].is_over_limit);

    library
        .modify(&formula_id, |formula: &mut Formula| composition::scale(formula, 200.0))
        .unwrap();

    let formula = library.formula(&formula_id).unwrap();
    assert_eq!(formula.diluent_weight, 180.0);
    assert_eq!(formula.lines[0].amount_grams, 20.0);
    assert!(relative_eq(formula.total_formula_weight(), 200.0));
}

#[test]
fn half_strength_solution_is_five_percent() {
    let (library, _, formula_id) = perfume(50.0);
    let formula = library.formula(&formula_id).unwrap();
    let line = &composition::compute_line_metrics(formula, &library)[0];
    assert_eq!(line.actual_mass, 5.0);
    assert!(relative_eq(line.final_concentration, 5.0));
}

#[test]
fn every_line_matches_the_closed_form() {
    let mut library = Library::new();
    let chemicals: Vec<Chemical> = (0..6)
        .map(|i| Chemical::new(format!("Material {i}")).with_ifra_safe_limit(3.0))
        .collect();
    let mut formula = Formula::new("Accord").with_diluent(Some(Diluent::Dpg), 17.3);
    for (i, chemical) in chemicals.iter().enumerate() {
        let amount = 0.37 * (i as f64 + 1.0);
        let dilution = [100.0, 50.0, 10.0, 1.0, 125.0, 0.0][i];
        composition::add_line(&mut formula, chemical, amount, dilution).unwrap();
    }
    for chemical in chemicals {
        library.put(chemical).unwrap();
    }

    let total = formula.total_formula_weight();
    let first = composition::compute_line_metrics(&formula, &library);
    for (metrics, line) in first.iter().zip(&formula.lines) {
        let expected = (line.amount_grams * line.dilution_percentage / 100.0) / total * 100.0;
        assert!(relative_eq(metrics.final_concentration, expected));
        assert_eq!(metrics.is_over_limit, metrics.final_concentration > 3.0);
    }

    // recomputation without mutation is identical
    assert_eq!(composition::compute_line_metrics(&formula, &library), first);
}

#[test]
fn scaling_hits_any_positive_target_and_keeps_dilutions() {
    for target in [0.001, 1.0, 33.3, 250.0, 1.0e6] {
        let (mut library, _, formula_id) = perfume(37.5);
        library
            .modify(&formula_id, |formula: &mut Formula| composition::scale(formula, target))
            .unwrap();
        let formula = library.formula(&formula_id).unwrap();
        assert!(relative_eq(formula.total_formula_weight(), target));
        assert_eq!(formula.lines[0].dilution_percentage, 37.5);
    }
}

#[test]
fn scaling_an_empty_formula_is_rejected_without_changes() {
    let mut library = Library::new();
    let formula = Formula::new("Blank");
    let id = formula.id;
    library.put(formula).unwrap();

    let err = library
        .modify(&id, |formula: &mut Formula| composition::scale(formula, 100.0))
        .unwrap_err();
    assert!(matches!(err, FfragranceError::InvalidScaleTarget { .. }));
    assert_eq!(err.to_string(), "Cannot scale a formula weighing 0 g to 100 g");
    assert_eq!(library.formula(&id).unwrap().diluent_weight, 0.0);
}

#[test]
fn category_with_a_chemical_cannot_be_deleted() {
    let (mut library, chemical_id, formula_id) = perfume(100.0);
    let florals_id = library.chemical(&chemical_id).unwrap().category_id.unwrap();

    let err = Repository::<Category>::delete(&mut library, &florals_id).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot delete category 'Florals': still used by Phenylethyl Alcohol"
    );

    let breakdown = composition::aggregate_by_category(&composition::compute_line_metrics(
        library.formula(&formula_id).unwrap(),
        &library,
    ));
    assert!(relative_eq(breakdown[&CategoryKey::Category(florals_id)], 10.0));

    Repository::<Formula>::delete(&mut library, &formula_id).unwrap();
    Repository::<Chemical>::delete(&mut library, &chemical_id).unwrap();
    Repository::<Category>::delete(&mut library, &florals_id).unwrap();
    assert!(library.is_empty());
}

#[test]
fn export_reports_final_concentration_per_line() {
    let (library, chemical_id, formula_id) = perfume(50.0);
    let mut buffer = Vec::new();
    exchange::export_csv(&library, &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();

    let line_id = library.formula(&formula_id).unwrap().lines[0].id;
    let row = text
        .lines()
        .find(|l| l.starts_with(&line_id.to_string()))
        .expect("formula line row");
    assert_eq!(row, format!("{line_id},{formula_id},{chemical_id},10.0,50.0,5.0"));
}
