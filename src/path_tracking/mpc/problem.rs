//! One control cycle's optimization problem

use num_dual::DualNum;

use super::constraints::ConstraintAssembler;
use super::cost::CostFunction;
use crate::common::{MotionModel, PathModel};
use crate::optimization::{NlpProblem, SparsityPattern};

/// Cost and dynamics for a fixed reference path
pub struct MpcProblem<'a, M: MotionModel> {
    cost: &'a CostFunction,
    constraints: &'a ConstraintAssembler,
    model: &'a M,
    path: &'a PathModel,
}

impl<'a, M: MotionModel> MpcProblem<'a, M> {
    pub fn new(
        cost: &'a CostFunction,
        constraints: &'a ConstraintAssembler,
        model: &'a M,
        path: &'a PathModel,
    ) -> Self {
        Self { cost, constraints, model, path }
    }
}

impl<M: MotionModel> NlpProblem for MpcProblem<'_, M> {
    fn num_variables(&self) -> usize {
        self.constraints.layout().num_variables()
    }

    fn num_constraints(&self) -> usize {
        self.constraints.layout().num_constraints()
    }

    fn objective<D: DualNum<f64> + Copy>(&self, vars: &[D]) -> D {
        self.cost.evaluate(vars)
    }

    fn constraints<D: DualNum<f64> + Copy>(&self, vars: &[D], out: &mut [D]) {
        self.constraints.evaluate(self.model, self.path, vars, out);
    }

    fn jacobian_sparsity(&self) -> Option<SparsityPattern> {
        Some(self.constraints.jacobian_sparsity())
    }

    fn hessian_sparsity(&self) -> Option<SparsityPattern> {
        Some(self.cost.hessian_sparsity())
    }
}
