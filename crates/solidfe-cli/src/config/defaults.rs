pub struct DefaultsConfig {
    pub lammps_command: &'static str,
    pub timestep: f64,
    pub n_small_steps: u64,
    pub n_every_steps: u64,
    pub n_repeat_steps: u64,
    pub n_cycles: usize,
    pub thermostat_damping: f64,
    pub equilibration_thermostat_damping: f64,
    pub equilibration_barostat_damping: f64,
    pub pressure_tolerance: f64,
    pub spring_constant_tolerance: f64,
    pub solid_fraction: f64,
    pub pressure: f64,
    pub repeat: [usize; 3],
    pub n_equilibration_steps: u64,
    pub n_switching_steps: u64,
    pub n_iterations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            lammps_command: "lmp",
            timestep: 0.001,
            n_small_steps: 10000,
            n_every_steps: 10,
            n_repeat_steps: 10,
            n_cycles: 100,
            thermostat_damping: 0.1,
            equilibration_thermostat_damping: 0.1,
            equilibration_barostat_damping: 0.1,
            pressure_tolerance: 0.5,
            spring_constant_tolerance: 0.01,
            solid_fraction: 0.7,
            pressure: 0.0,
            repeat: [1, 1, 1],
            n_equilibration_steps: 25000,
            n_switching_steps: 50000,
            n_iterations: 1,
        }
    }
}
