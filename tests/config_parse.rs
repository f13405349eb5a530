use porosim::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../porosim.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.toolchain.flow_binary, "fluid_sim");
    assert_eq!(cfg.toolchain.diffusion_sources.len(), 3);
    assert!(cfg.output.history_tail >= 1);
}

#[test]
fn empty_config_falls_back_to_defaults() {
    let cfg: Config = toml::from_str("").expect("parse TOML");
    assert_eq!(cfg.limits.max_input_file_bytes, 10 * 1024 * 1024);
    assert_eq!(cfg.limits.job_timeout_seconds, 0);
    assert_eq!(cfg.toolchain.diffusion_executable, "diffusivity_sim");
}
