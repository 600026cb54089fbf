use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LatticeError {
    #[error("Unsupported lattice '{0}'. Supported lattices: fcc, bcc, hcp, sc, diamond")]
    Unsupported(String),
    #[error("Lattice constant must be positive, got {0}")]
    InvalidConstant(f64),
    #[error("At least one element is required to build a lattice")]
    NoElements,
}

/// What a calculation asks of the lattice generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeRequest<'a> {
    pub lattice: &'a str,
    pub lattice_constant: f64,
    pub n_elements: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatticeInfo {
    pub lattice: String,
    pub lattice_constant: f64,
    pub atoms_per_cell: usize,
    pub concentrations: Vec<f64>,
}

impl LatticeInfo {
    pub fn atom_count(&self, repeat: [usize; 3]) -> usize {
        repeat.iter().product::<usize>() * self.atoms_per_cell
    }
}

pub trait LatticeGenerator: Sync {
    fn prepare(&self, request: &LatticeRequest) -> Result<LatticeInfo, LatticeError>;
}

/// The conventional cubic (or orthogonal, for hcp) cells understood by the
/// engine's `lattice` command.
///
/// Every site is occupied by the first species, so the concentrations are
/// always `[1, 0, ..]`. The other species carry no atoms and take the
/// whole-system spring constant unless one is supplied for them. An alloy
/// with mixed occupation needs a [`LatticeGenerator`] that reads the
/// concentrations from its structure input.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLattice;

impl BuiltinLattice {
    pub fn atoms_per_cell(name: &str) -> Option<usize> {
        match name {
            "sc" => Some(1),
            "bcc" => Some(2),
            "fcc" | "hcp" => Some(4),
            "diamond" => Some(8),
            _ => None,
        }
    }
}

impl LatticeGenerator for BuiltinLattice {
    fn prepare(&self, request: &LatticeRequest) -> Result<LatticeInfo, LatticeError> {
        if request.n_elements == 0 {
            return Err(LatticeError::NoElements);
        }
        let name = request.lattice.trim().to_lowercase();
        let atoms_per_cell = Self::atoms_per_cell(&name)
            .ok_or_else(|| LatticeError::Unsupported(request.lattice.to_string()))?;
        if request.lattice_constant.is_nan() || request.lattice_constant <= 0.0 {
            return Err(LatticeError::InvalidConstant(request.lattice_constant));
        }

        let mut concentrations = vec![0.0; request.n_elements];
        concentrations[0] = 1.0;

        Ok(LatticeInfo {
            lattice: name,
            lattice_constant: request.lattice_constant,
            atoms_per_cell,
            concentrations,
        })
    }
}
