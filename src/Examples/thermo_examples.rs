use crate::Thermodynamics::ChemReaction::reaction_request::ReactionRequest;
use crate::Thermodynamics::DBhandlers::compound_record::Phase;
use crate::Thermodynamics::thermo_lib_api::ThermoData;
use crate::settings::ThermoSettings;
use log::error;

pub fn thermo_examples(thermotask: usize) {
    let settings = match ThermoSettings::from_file(crate::settings::SETTINGS_FILE) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let thermo_data = ThermoData::from_settings(settings);

    match thermo_examples_task(&thermo_data, thermotask) {
        Ok(()) => {}
        Err(e) => error!("task {} failed: {}", thermotask, e),
    }
}

fn thermo_examples_task(
    thermo_data: &ThermoData,
    thermotask: usize,
) -> Result<(), crate::Thermodynamics::thermo_errors::ThermoError> {
    match thermotask {
        0 => {
            // properties of water, liquid then steam
            let request = ReactionRequest::new(&["H2O"], [300.0, 600.0])
                .with_step(50.0)
                .with_phases(&[Some("l")])
                .with_properties(&["Cp", "H", "S", "G"]);
            let data = thermo_data.calculate(&request)?;
            data.pretty_print();
            if let Some(selection) = data.selection("H2O") {
                println!(
                    "records used: {:?}, split at {:?} K",
                    selection.chosen_record_ids(),
                    selection.split_points
                );
            }
        }
        1 => {
            let request = ReactionRequest::new(&["Zn", "S", "ZnS"], [298.0, 1000.0])
                .with_equation("Zn + S -> ZnS");
            let data = thermo_data.calculate(&request)?;
            data.pretty_print();
            for p in &data.reaction_points {
                println!("T = {} K, log10 K = {:?}", p.T, p.log10_K);
            }
        }
        2 => {
            // one unknown compound: result is partial
            let request = ReactionRequest::new(&["CO", "Xyz123"], [300.0, 500.0]);
            let data = thermo_data.calculate(&request)?;
            data.pretty_print();
            println!("missing: {:?}", data.missing_compounds);
            // only unknown compounds: the request fails
            let request = ReactionRequest::new(&["Xyz123"], [300.0, 500.0]);
            if let Err(e) = thermo_data.calculate(&request) {
                println!("as expected: {}", e);
            }
        }
        3 => {
            // segments of TiO2 across its melting point
            let selection = thermo_data.segments_for("TiO2", None, (400.0, 1500.0))?;
            for s in &selection.segments {
                println!(
                    "{:>8.2} .. {:>8.2} K: record {} ({}), {:?}",
                    s.t_low, s.t_high, s.record.id, s.record.phase, s.source
                );
            }
            for w in &selection.warnings {
                println!("warning: {}", w.message);
            }
            let request = ReactionRequest::new(&["TiO2"], [400.0, 1500.0])
                .with_properties(&["Cp", "H", "G"]);
            thermo_data.calculate(&request)?.pretty_print();
        }
        4 => {
            let request = ReactionRequest::new(&["H2", "O2", "H2O"], [400.0, 1500.0])
                .with_step(250.0)
                .with_phases(&[None, None, Some("g")])
                .with_equation("2H2 + O2 -> 2H2O");
            let data = thermo_data.calculate(&request)?;
            data.pretty_print();
            match data.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => error!("{}", e),
            }
        }
        5 => {
            // phase given explicitly for an ion
            let selection = thermo_data.segments_for("Cl-", Some(Phase::Ion), (298.15, 350.0))?;
            println!("{} segment(s) for Cl(-)", selection.segments.len());
        }
        _ => println!("no such task: {}", thermotask),
    }
    Ok(())
}
