use std::env;

pub fn insta_snapshot<F: FnOnce()>(f: F) {
    let mut settings = insta::Settings::clone_current();
    let snapshot_path = env::current_dir().unwrap().join("./test/snapshots");
    settings.set_snapshot_path(snapshot_path);
    settings.bind(f);
}

fn peak(x: f64, center: f64, height: f64) -> f64 {
    return height * (-((x - center) / 0.15).powi(2)).exp();
}

/// `x yobs ycalc` table from 20° to 60° in 0.1° steps. The strongest peak
/// sits at 32°; the calculated curve underestimates the 45.5° peak.
pub fn refinement_output_fixture() -> String {
    return (0..=400)
        .map(|idx| {
            let x = 20.0 + idx as f64 * 0.1;
            let obs = 50.0 + peak(x, 32.0, 1000.0) + peak(x, 45.5, 500.0);
            let calc = 50.0 + peak(x, 32.0, 990.0) + peak(x, 45.5, 380.0);
            return format!("{x:.2} {obs:.3} {calc:.3}");
        })
        .collect::<Vec<String>>()
        .join("\n");
}

/// `h k l m d 2θ I` reflection list matching [`refinement_output_fixture`].
pub fn hkl_fixture() -> &'static str {
    return r#"
# h k l m d 2th I
  1   1   1   8  2.79450  32.0000  100.000
  2   0   0   6  2.42005  37.1200   12.500
  2   2   0  12  1.99227  45.5000   55.000
  3   1   1  24  1.70000  53.9000    8.000
"#
    .trim();
}

/// One page of an OPTIMADE `/v1/structures` response holding a rock salt
/// entry, optionally linking to a next page.
pub fn optimade_page_fixture(id: &str, next: Option<&str>) -> String {
    let next = match next {
        Some(url) => format!("\"{url}\""),
        None => "null".to_string(),
    };

    return format!(
        r#"{{
  "data": [
    {{
      "id": "{id}",
      "type": "structures",
      "attributes": {{
        "elements": ["Cl", "Na"],
        "chemical_formula_reduced": "ClNa",
        "space_group_symbol_hermann_mauguin": "F m -3 m",
        "lattice_vectors": [[5.64, 0.0, 0.0], [0.0, 5.64, 0.0], [0.0, 0.0, 5.64]],
        "cartesian_site_positions": [[0.0, 0.0, 0.0], [2.82, 2.82, 2.82]],
        "species_at_sites": ["Na1", "Cl1"],
        "species": [
          {{ "name": "Na1", "chemical_symbols": ["Na"], "concentration": [1.0] }},
          {{ "name": "Cl1", "chemical_symbols": ["Cl"], "concentration": [1.0] }}
        ]
      }}
    }}
  ],
  "links": {{ "next": {next} }},
  "meta": {{ "more_data_available": false }}
}}"#
    );
}
