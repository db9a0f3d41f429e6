#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing may fail; validation may fail; neither may panic.
    if let Ok(cfg) = plotter_config::load_toml(data) {
        let _ = cfg.validate();
        let _ = cfg.stepper.resolved_steps_per_unit();
    }
});
