use crate::internal::*;
use crate::model::eval_order_for_nodes;
use crate::ops::array::ConstantLike;
use crate::ops::math::Add;

/// Extend `model` with nodes computing the gradients of `output` with
/// respect to each of the `wrt` outlets.
///
/// `seed` is the gradient of `output`. When it is `None`, a tensor of ones is
/// used. Outlets `output` does not depend on get a zero gradient.
pub fn gradients(
    model: &mut TypedModel,
    output: OutletId,
    seed: Option<OutletId>,
    wrt: &[OutletId],
) -> GraftResult<TVec<OutletId>> {
    let order = eval_order_for_nodes(model.nodes(), &[], &[output.node])?;
    let output_fact = model.outlet_fact(output)?.clone();
    if !output_fact.datum_type.is_float() {
        bail!(GraphError::TypeMismatch(format!(
            "Can not differentiate {:?} values",
            output_fact.datum_type
        )));
    }
    let seed = match seed {
        Some(seed) => {
            output_fact.check_fact(model.outlet_fact(seed)?).context("Checking gradient seed")?;
            seed
        }
        None => {
            let name = model.unique_name(format!("{}.seed", model.node(output.node).name));
            model.wire_node(name, ConstantLike::new(1.0), &[output])?[0]
        }
    };

    let mut grads: HashMap<OutletId, OutletId> = HashMap::default();
    grads.insert(output, seed);
    for &n in order.iter().rev() {
        let outlet = OutletId::new(n, 0);
        let Some(&grad) = grads.get(&outlet) else { continue };
        let node = model.node(n);
        let (op, inputs, name) = (node.op.clone(), node.inputs.clone(), node.name.clone());
        let wrt_inputs = op.diff_wrt(inputs.len());
        if !wrt_inputs.iter().any(|&d| d) {
            continue;
        }
        trace!("Differentiating {}", model.node(n));
        let contributions = op
            .sym_diff(model, &name, &inputs, outlet, grad)
            .with_context(|| format!("Differentiating {name}"))?;
        ensure!(
            contributions.len() == inputs.len(),
            "{} returned {} gradients for {} inputs",
            name,
            contributions.len(),
            inputs.len()
        );
        for ((input, eligible), contribution) in inputs.iter().zip(wrt_inputs).zip(contributions) {
            let Some(contribution) = contribution.filter(|_| eligible) else { continue };
            let total = match grads.get(input) {
                Some(&previous) => {
                    let sum = model.unique_name(format!("{name}.grad.sum"));
                    model.wire_node(sum, Add, &[previous, contribution])?[0]
                }
                None => contribution,
            };
            grads.insert(*input, total);
        }
    }

    let mut result = tvec!();
    for o in wrt {
        let grad = match grads.get(o) {
            Some(&grad) => grad,
            None => {
                let name = model.unique_name(format!("{}.zero_grad", model.node(o.node).name));
                model.wire_node(name, ConstantLike::new(0.0), &[*o])?[0]
            }
        };
        result.push(grad);
    }
    Ok(result)
}
