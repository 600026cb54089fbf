use std::path::PathBuf;

/// The terms that add up to the final free energy, all in eV/atom.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FreeEnergyTerms {
    pub reference: f64,
    pub work: f64,
    pub dissipation: f64,
    pub error: f64,
    pub pv: f64,
    pub free_energy: f64,
}

/// Mutable per-kernel state, threaded through the stages by `&mut`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub atom_count: usize,
    /// Effective target pressure; replaced by the measured value when the
    /// lattice is held fixed.
    pub pressure: f64,
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub volume: f64,
    pub volume_per_atom: f64,
    pub spring_constants: Option<Vec<f64>>,
    pub snapshot: Option<PathBuf>,
    pub terms: FreeEnergyTerms,
}

impl RunState {
    pub fn new(atom_count: usize, pressure: f64) -> Self {
        Self {
            atom_count,
            pressure,
            lx: 0.0,
            ly: 0.0,
            lz: 0.0,
            volume: 0.0,
            volume_per_atom: 0.0,
            spring_constants: None,
            snapshot: None,
            terms: FreeEnergyTerms::default(),
        }
    }

    /// Records averaged box edges; the volume follows from them.
    pub fn apply_box(&mut self, lx: f64, ly: f64, lz: f64, volume_per_atom: f64) {
        self.lx = lx;
        self.ly = ly;
        self.lz = lz;
        self.volume = lx * ly * lz;
        self.volume_per_atom = volume_per_atom;
    }
}
