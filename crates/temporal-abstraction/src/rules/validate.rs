//! Checks run over reachable definitions before any rule is built.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::algorithm::{Algorithm, AlgorithmArgument, AlgorithmSource};
use crate::definition::{DefinitionKind, PropositionDefinition};
use crate::types::{AbstractionError, AbstractionResult, Value, ValueComparator};

fn check_argument(
    definition: &str,
    algorithm: &dyn Algorithm,
    name: &str,
    argument: &AlgorithmArgument,
) -> AbstractionResult<()> {
    let parameter = algorithm.parameter(name).ok_or_else(|| {
        AbstractionError::InvalidDefinition(format!(
            "{definition}: algorithm {} has no parameter {name}",
            algorithm.id()
        ))
    })?;
    if !parameter.comparators.contains(&argument.comparator) {
        return Err(AbstractionError::InvalidDefinition(format!(
            "{definition}: comparator {} is not allowed for {}.{name}",
            argument.comparator,
            algorithm.id()
        )));
    }
    let type_ok = match (&argument.value, argument.comparator) {
        (Value::List(items), ValueComparator::In | ValueComparator::NotIn) => items
            .iter()
            .all(|v| parameter.value_type.accepts(v.value_type())),
        (value, _) => parameter.value_type.accepts(value.value_type()),
    };
    if !type_ok {
        return Err(AbstractionError::InvalidDefinition(format!(
            "{definition}: argument {name} = {} does not have type {:?}",
            argument.value, parameter.value_type
        )));
    }
    Ok(())
}

/// Resolve every low-level definition's algorithm and check its value
/// definitions' arguments against the algorithm's declared parameters.
/// Returns the resolved algorithms by definition id.
pub fn validate_algorithms(
    definitions: &[Arc<PropositionDefinition>],
    algorithms: &dyn AlgorithmSource,
) -> AbstractionResult<HashMap<String, Arc<dyn Algorithm>>> {
    let mut resolved = HashMap::new();
    for definition in definitions {
        let Some(low_level) = definition.as_low_level() else {
            continue;
        };
        if let Some(context_id) = &low_level.context_id {
            let is_context = definitions
                .iter()
                .any(|d| d.id() == context_id && matches!(d.kind(), DefinitionKind::Context(_)));
            if !is_context {
                return Err(AbstractionError::InvalidDefinition(format!(
                    "{}: context {context_id} is not a context definition",
                    definition.id()
                )));
            }
        }
        let Some(algorithm_id) = &low_level.algorithm_id else {
            continue;
        };
        let algorithm = algorithms
            .read_algorithm(algorithm_id)?
            .ok_or_else(|| AbstractionError::NoSuchAlgorithm {
                definition: definition.id().to_string(),
                algorithm: algorithm_id.clone(),
            })?;
        for value_definition in &low_level.value_definitions {
            for (name, argument) in value_definition.parameters.iter() {
                check_argument(definition.id(), algorithm.as_ref(), name, argument)?;
            }
        }
        debug!(definition = definition.id(), algorithm = %algorithm_id, "validated algorithm");
        resolved.insert(definition.id().to_string(), algorithm);
    }
    Ok(resolved)
}
