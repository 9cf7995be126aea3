/// numbered demo tasks on the bundled sample dataset
pub mod thermo_examples;
