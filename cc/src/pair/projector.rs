//! Orthogonal projectors on pair functions.
//!
//! Three projector kinds act on pair-function collections: a simple
//! projector onto a one-particle basis, its complement, and the strong
//! orthogonality projector Q12 = (1-O1)(1-O2) over both particles. The
//! kinds form a closed enum and every variant combination is matched
//! exhaustively.

use mra::{OneParticleFunction, Particle, TwoParticleFunction};

use super::function::PairFunction;

/// O_p = Σ_k |ket_k⟩⟨bra_k| acting on one particle.
///
/// The plain constructor uses one basis for bra and ket; distinct vectors
/// allow a non-orthonormal metric.
#[derive(Clone)]
pub struct SimpleProjector<F: OneParticleFunction> {
    particle: Particle,
    bra: Vec<F>,
    ket: Vec<F>,
}

impl<F: OneParticleFunction> SimpleProjector<F> {
    pub fn new(particle: Particle, basis: &[F]) -> Self {
        Self::with_metric(particle, basis.to_vec(), basis.to_vec())
    }

    pub fn with_metric(particle: Particle, bra: Vec<F>, ket: Vec<F>) -> Self {
        if bra.is_empty() || bra.len() != ket.len() {
            panic!(
                "projector basis must be non-empty with matching bra and ket sizes, got {} and {}",
                bra.len(),
                ket.len()
            );
        }
        SimpleProjector { particle, bra, ket }
    }

    pub fn particle(&self) -> Particle {
        self.particle
    }

    pub fn bra(&self) -> &[F] {
        &self.bra
    }

    pub fn ket(&self) -> &[F] {
        &self.ket
    }

    /// O f = Σ_k |ket_k⟩ ⟨bra_k|f⟩.
    pub fn project(&self, f: &F) -> F {
        let mut result = f.zeros_like();
        for (bk, kk) in self.bra.iter().zip(&self.ket) {
            result.accumulate(&kk.scaled(bk.inner(f)));
        }
        result
    }

    fn project_all(&self, fs: &[F]) -> Vec<F> {
        fs.iter().map(|f| self.project(f)).collect()
    }
}

/// Q_p = 1 - O_p.
#[derive(Clone)]
pub struct ComplementProjector<F: OneParticleFunction> {
    simple: SimpleProjector<F>,
}

impl<F: OneParticleFunction> ComplementProjector<F> {
    pub fn new(particle: Particle, basis: &[F]) -> Self {
        ComplementProjector {
            simple: SimpleProjector::new(particle, basis),
        }
    }

    pub fn with_metric(particle: Particle, bra: Vec<F>, ket: Vec<F>) -> Self {
        ComplementProjector {
            simple: SimpleProjector::with_metric(particle, bra, ket),
        }
    }

    pub fn particle(&self) -> Particle {
        self.simple.particle()
    }

    pub fn simple(&self) -> &SimpleProjector<F> {
        &self.simple
    }

    /// Q f = f - O f.
    pub fn project(&self, f: &F) -> F {
        let mut result = f.clone();
        result.accumulate(&self.simple.project(f).scaled(-1.0));
        result
    }

    fn project_all(&self, fs: &[F]) -> Vec<F> {
        fs.iter().map(|f| self.project(f)).collect()
    }
}

/// Q12 = 1 - O1 - O2 + O1 O2 over both particles' (possibly distinct)
/// bases.
#[derive(Clone)]
pub struct StrongOrthogonalityProjector<F: OneParticleFunction> {
    bra1: Vec<F>,
    ket1: Vec<F>,
    bra2: Vec<F>,
    ket2: Vec<F>,
}

impl<F: OneParticleFunction> StrongOrthogonalityProjector<F> {
    pub fn new(basis1: &[F], basis2: &[F]) -> Self {
        Self::with_metric(
            basis1.to_vec(),
            basis1.to_vec(),
            basis2.to_vec(),
            basis2.to_vec(),
        )
    }

    pub fn with_metric(bra1: Vec<F>, ket1: Vec<F>, bra2: Vec<F>, ket2: Vec<F>) -> Self {
        if bra1.is_empty() || bra1.len() != ket1.len() || bra2.is_empty() || bra2.len() != ket2.len()
        {
            panic!("strong-orthogonality projector needs non-empty matching bases per particle");
        }
        StrongOrthogonalityProjector {
            bra1,
            ket1,
            bra2,
            ket2,
        }
    }

    pub fn o1(&self) -> SimpleProjector<F> {
        SimpleProjector::with_metric(Particle::One, self.bra1.clone(), self.ket1.clone())
    }

    pub fn o2(&self) -> SimpleProjector<F> {
        SimpleProjector::with_metric(Particle::Two, self.bra2.clone(), self.ket2.clone())
    }

    pub fn q1(&self) -> ComplementProjector<F> {
        ComplementProjector {
            simple: self.o1(),
        }
    }

    pub fn q2(&self) -> ComplementProjector<F> {
        ComplementProjector {
            simple: self.o2(),
        }
    }
}

/// The closed set of projector kinds.
#[derive(Clone)]
pub enum Projector<F: OneParticleFunction> {
    Simple(SimpleProjector<F>),
    Complement(ComplementProjector<F>),
    StrongOrthogonality(StrongOrthogonalityProjector<F>),
}

/// Applies `projector` to a collection of pair functions.
///
/// The result may contain more terms than the argument: the complement of
/// an op-decomposed function is the original term plus its sign-flipped
/// simple image.
pub fn apply_projector<'op, T: TwoParticleFunction>(
    projector: &Projector<T::Sp>,
    argument: &[PairFunction<'op, T>],
) -> Vec<PairFunction<'op, T>> {
    let mut result = Vec::with_capacity(argument.len());
    for pf in argument {
        match pf {
            PairFunction::Pure(u) => match projector {
                Projector::Simple(p) => result.push(PairFunction::Pure(apply_o_pure(p, u))),
                Projector::Complement(q) => {
                    let mut r = u.clone();
                    r.accumulate(&apply_o_pure(q.simple(), u).scaled(-1.0));
                    result.push(PairFunction::Pure(r));
                }
                Projector::StrongOrthogonality(so) => {
                    result.push(PairFunction::Pure(apply_so_pure(so, u)));
                }
            },
            PairFunction::Decomposed { a, b } => match projector {
                // O1 |kl⟩ = |(O1 k) l⟩, factor-wise on the targeted particle
                Projector::Simple(p) => result.push(match p.particle() {
                    Particle::One => PairFunction::Decomposed {
                        a: p.project_all(a),
                        b: b.clone(),
                    },
                    Particle::Two => PairFunction::Decomposed {
                        a: a.clone(),
                        b: p.project_all(b),
                    },
                }),
                Projector::Complement(q) => result.push(match q.particle() {
                    Particle::One => PairFunction::Decomposed {
                        a: q.project_all(a),
                        b: b.clone(),
                    },
                    Particle::Two => PairFunction::Decomposed {
                        a: a.clone(),
                        b: q.project_all(b),
                    },
                }),
                // Q12 |kl⟩ = |(Q1 k)(Q2 l)⟩
                Projector::StrongOrthogonality(so) => result.push(PairFunction::Decomposed {
                    a: so.q1().project_all(a),
                    b: so.q2().project_all(b),
                }),
            },
            PairFunction::OpDecomposed { op, a, b } => match projector {
                Projector::Simple(p) => {
                    // P1 op |a_i b_i⟩ = Σ_k |k⟩ ⊗ Σ_i b_i · op(a_i · bra_k):
                    // the projector commutes through the kernel by
                    // re-expressing the projected particle over the basis
                    let (first, second) = match p.particle() {
                        Particle::One => (a, b),
                        Particle::Two => (b, a),
                    };
                    let thresh = op.parameters().thresh_op;
                    let mut cross: Vec<T::Sp> = Vec::with_capacity(p.bra().len());
                    for k in p.bra() {
                        let mut acc = k.zeros_like();
                        for (ai, bi) in first.iter().zip(second) {
                            acc.accumulate(&op.convolve(&ai.product(k)).product(bi));
                        }
                        cross.push(acc.truncated(thresh));
                    }
                    let basis = p.ket().to_vec();
                    result.push(match p.particle() {
                        Particle::One => PairFunction::Decomposed { a: basis, b: cross },
                        Particle::Two => PairFunction::Decomposed { a: cross, b: basis },
                    });
                }
                Projector::Complement(q) => {
                    // Q1 op |a_i b_i⟩ = op |a_i b_i⟩ - P1 op |a_i b_i⟩
                    result.push(pf.clone());
                    let image = apply_projector(
                        &Projector::Simple(q.simple().clone()),
                        std::slice::from_ref(pf),
                    );
                    for mut term in image {
                        term.invert_sign();
                        result.push(term);
                    }
                }
                Projector::StrongOrthogonality(so) => {
                    // Q12 = Q1 Q2, each complement expanding recursively
                    let tmp =
                        apply_projector(&Projector::Complement(so.q2()), std::slice::from_ref(pf));
                    result.extend(apply_projector(&Projector::Complement(so.q1()), &tmp));
                }
            },
        }
    }
    result
}

/// Single-argument convenience wrapper; fatal if the projection does not
/// yield exactly one term.
pub fn apply_projector_one<'op, T: TwoParticleFunction>(
    projector: &Projector<T::Sp>,
    argument: &PairFunction<'op, T>,
) -> PairFunction<'op, T> {
    let mut result = apply_projector(projector, std::slice::from_ref(argument));
    if result.len() != 1 {
        panic!(
            "projection of a single pair function produced {} terms",
            result.len()
        );
    }
    result.remove(0)
}

/// O_p u = Σ_k |ket_k⟩_p ⟨bra_k|u⟩_p on a full 6D function.
fn apply_o_pure<T: TwoParticleFunction>(p: &SimpleProjector<T::Sp>, u: &T) -> T {
    let mut result = u.scaled(0.0);
    for (bk, kk) in p.bra().iter().zip(p.ket()) {
        let g = u.project_out(bk, p.particle());
        let term = match p.particle() {
            Particle::One => T::from_product(kk, &g),
            Particle::Two => T::from_product(&g, kk),
        };
        result.accumulate(&term);
    }
    result
}

/// Q12 u = u - O1 u - O2 u + O1 O2 u, the dedicated combined action on a
/// full 6D function.
fn apply_so_pure<T: TwoParticleFunction>(so: &StrongOrthogonalityProjector<T::Sp>, u: &T) -> T {
    let o1 = so.o1();
    let o2 = so.o2();
    let mut result = u.clone();
    result.accumulate(&apply_o_pure(&o1, u).scaled(-1.0));
    result.accumulate(&apply_o_pure(&o2, u).scaled(-1.0));
    // O1 O2 u = Σ_kl ⟨bra1_k bra2_l|u⟩ |ket1_k ket2_l⟩
    for (b1k, k1k) in o1.bra().iter().zip(o1.ket()) {
        let g = u.project_out(b1k, Particle::One);
        for (b2l, k2l) in o2.bra().iter().zip(o2.ket()) {
            let coeff = g.inner(b2l);
            result.accumulate(&T::from_product(k1k, k2l).scaled(coeff));
        }
    }
    result
}
