//! Parser for planning tasks in the translator SAS format (version 3).
//!
//! The format is line-based: sections are delimited by `begin_*`/`end_*` markers, and every
//! number or fact sits on a line of its own. Mutex groups are skipped (projections make no use
//! of them); axioms and conditional effects are rejected.

use squash::task::FactPair;
use squash::task::Operator;
use squash::task::PlanningTask;
use squash::task::VariableId;
use thiserror::Error;

/// A parse failure, located at the 1-based line it was detected on.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub(crate) struct SasParseError {
    pub(crate) line: usize,
    pub(crate) message: String,
}

struct SasReader<'a> {
    lines: Vec<&'a str>,
    position: usize,
}

impl<'a> SasReader<'a> {
    fn new(input: &'a str) -> Self {
        SasReader {
            lines: input.lines().map(str::trim_end).collect(),
            position: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> SasParseError {
        SasParseError {
            line: self.position,
            message: message.into(),
        }
    }

    fn next_line(&mut self) -> Result<&'a str, SasParseError> {
        let line = self
            .lines
            .get(self.position)
            .copied()
            .ok_or(SasParseError {
                line: self.position + 1,
                message: "unexpected end of file".to_owned(),
            })?;
        self.position += 1;
        Ok(line)
    }

    fn expect(&mut self, marker: &str) -> Result<(), SasParseError> {
        let line = self.next_line()?;
        if line != marker {
            return Err(self.error(format!("expected '{marker}', found '{line}'")));
        }
        Ok(())
    }

    fn parse<T: std::str::FromStr>(&mut self, description: &str) -> Result<T, SasParseError> {
        let line = self.next_line()?;
        line.parse()
            .map_err(|_| self.error(format!("expected {description}, found '{line}'")))
    }

    /// Parses a line of whitespace-separated integers.
    fn parse_numbers(&mut self, description: &str) -> Result<Vec<i64>, SasParseError> {
        let line = self.next_line()?;
        line.split_whitespace()
            .map(|token| {
                token
                    .parse()
                    .map_err(|_| self.error(format!("expected {description}, found '{line}'")))
            })
            .collect()
    }
}

pub(crate) fn parse_sas(input: &str) -> Result<PlanningTask, SasParseError> {
    let mut reader = SasReader::new(input);

    reader.expect("begin_version")?;
    let version: u32 = reader.parse("a format version")?;
    if version != 3 {
        return Err(reader.error(format!("unsupported translator format version {version}")));
    }
    reader.expect("end_version")?;

    reader.expect("begin_metric")?;
    let metric: u32 = reader.parse("the metric flag")?;
    if metric > 1 {
        return Err(reader.error(format!("the metric flag has to be 0 or 1, found {metric}")));
    }
    reader.expect("end_metric")?;

    let num_variables: usize = reader.parse("the number of variables")?;
    let mut domain_sizes = Vec::with_capacity(num_variables);
    for _ in 0..num_variables {
        reader.expect("begin_variable")?;
        let _name = reader.next_line()?;
        let axiom_layer: i64 = reader.parse("an axiom layer")?;
        if axiom_layer != -1 {
            return Err(reader.error("axioms are not supported"));
        }
        let domain_size: usize = reader.parse("a domain size")?;
        if domain_size == 0 {
            return Err(reader.error("every variable needs a non-empty domain"));
        }
        for _ in 0..domain_size {
            let _value_name = reader.next_line()?;
        }
        reader.expect("end_variable")?;
        domain_sizes.push(domain_size);
    }

    let num_mutex_groups: usize = reader.parse("the number of mutex groups")?;
    for _ in 0..num_mutex_groups {
        reader.expect("begin_mutex_group")?;
        let group_size: usize = reader.parse("a mutex group size")?;
        for _ in 0..group_size {
            let _mutex_fact = reader.next_line()?;
        }
        reader.expect("end_mutex_group")?;
    }

    reader.expect("begin_state")?;
    let mut initial_values = Vec::with_capacity(num_variables);
    for variable in 0..num_variables {
        let value: u32 = reader.parse("an initial state value")?;
        if value as usize >= domain_sizes[variable] {
            return Err(reader.error(format!(
                "initial value {value} of variable {variable} is outside its domain"
            )));
        }
        initial_values.push(value);
    }
    reader.expect("end_state")?;

    reader.expect("begin_goal")?;
    let num_goals: usize = reader.parse("the number of goal facts")?;
    let mut goals = Vec::with_capacity(num_goals);
    for _ in 0..num_goals {
        let fact = parse_fact(&mut reader, &domain_sizes, "a goal fact")?;
        goals.push(fact);
    }
    reader.expect("end_goal")?;

    let num_operators: usize = reader.parse("the number of operators")?;
    let mut operators = Vec::with_capacity(num_operators);
    for _ in 0..num_operators {
        reader.expect("begin_operator")?;
        let name = reader.next_line()?.to_owned();

        let num_prevail: usize = reader.parse("the number of prevail conditions")?;
        let mut preconditions = Vec::with_capacity(num_prevail);
        for _ in 0..num_prevail {
            let fact = parse_fact(&mut reader, &domain_sizes, "a prevail condition")?;
            preconditions.push(fact);
        }

        let num_effects: usize = reader.parse("the number of effects")?;
        let mut effects = Vec::with_capacity(num_effects);
        for _ in 0..num_effects {
            let numbers = reader.parse_numbers("an effect line")?;
            // <num conditions> <variable> <value before> <value after>
            if numbers.len() != 4 {
                return Err(reader.error("expected an effect line of four numbers"));
            }
            if numbers[0] != 0 {
                return Err(reader.error("conditional effects are not supported"));
            }
            let variable = validate_variable(&reader, &domain_sizes, numbers[1])?;
            let value_before = numbers[2];
            if value_before != -1 {
                let fact =
                    validate_fact(&reader, &domain_sizes, variable, value_before, "an effect")?;
                preconditions.push(fact);
            }
            let fact = validate_fact(&reader, &domain_sizes, variable, numbers[3], "an effect")?;
            effects.push(fact);
        }

        let cost: u32 = reader.parse("an operator cost")?;
        reader.expect("end_operator")?;

        // With the metric flag unset every operator counts as a unit-cost action.
        let cost = if metric == 1 { cost } else { 1 };
        operators.push(Operator::new(name, preconditions, effects, cost));
    }

    let num_axioms: usize = reader.parse("the number of axioms")?;
    if num_axioms != 0 {
        return Err(reader.error("axioms are not supported"));
    }

    Ok(PlanningTask::new(
        domain_sizes,
        initial_values,
        goals,
        operators,
    ))
}

fn parse_fact(
    reader: &mut SasReader,
    domain_sizes: &[usize],
    description: &str,
) -> Result<FactPair, SasParseError> {
    let numbers = reader.parse_numbers(description)?;
    if numbers.len() != 2 {
        return Err(reader.error(format!("expected {description} of two numbers")));
    }
    let variable = validate_variable(reader, domain_sizes, numbers[0])?;
    validate_fact(reader, domain_sizes, variable, numbers[1], description)
}

fn validate_variable(
    reader: &SasReader,
    domain_sizes: &[usize],
    variable: i64,
) -> Result<VariableId, SasParseError> {
    if variable < 0 || variable as usize >= domain_sizes.len() {
        return Err(reader.error(format!("variable {variable} is out of range")));
    }
    Ok(VariableId::new(variable as u32))
}

fn validate_fact(
    reader: &SasReader,
    domain_sizes: &[usize],
    variable: VariableId,
    value: i64,
    description: &str,
) -> Result<FactPair, SasParseError> {
    if value < 0 || value as usize >= domain_sizes[variable.id() as usize] {
        return Err(reader.error(format!(
            "value {value} of {description} on {variable} is outside the domain"
        )));
    }
    Ok(FactPair::new(variable, value as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two binary variables; one operator setting variable 1 under the prevail var0=1.
    const SMALL_INSTANCE: &str = "begin_version
3
end_version
begin_metric
1
end_metric
2
begin_variable
var0
-1
2
Atom at-home()
NegatedAtom at-home()
end_variable
begin_variable
var1
-1
2
Atom done()
NegatedAtom done()
end_variable
1
begin_mutex_group
2
0 0
0 1
end_mutex_group
begin_state
1
0
end_state
begin_goal
1
1 1
end_goal
1
begin_operator
finish x
1
0 1
1
0 1 0 1
5
end_operator
0
";

    #[test]
    fn parses_a_small_instance() {
        let task = parse_sas(SMALL_INSTANCE).expect("a well-formed instance");
        assert_eq!(task.num_variables(), 2);
        assert_eq!(task.num_operators(), 1);
        assert_eq!(task.goals().len(), 1);

        let operator = task.operator(squash::task::OperatorId::new(0));
        assert_eq!(operator.name(), "finish x");
        assert_eq!(operator.cost(), 5);
        // the prevail condition and the effect's value-before both become preconditions
        assert_eq!(operator.preconditions().len(), 2);
        assert_eq!(operator.effects().len(), 1);
    }

    #[test]
    fn unit_metric_overrides_operator_costs() {
        let instance = SMALL_INSTANCE.replacen("begin_metric\n1", "begin_metric\n0", 1);
        let task = parse_sas(&instance).expect("a well-formed instance");
        assert_eq!(task.operator(squash::task::OperatorId::new(0)).cost(), 1);
    }

    #[test]
    fn conditional_effects_are_rejected() {
        let instance = SMALL_INSTANCE.replacen("0 1 0 1", "1 0 0 1 0 1", 1);
        let error = parse_sas(&instance).unwrap_err();
        assert!(error.message.contains("conditional effects"));
    }

    #[test]
    fn truncated_instances_are_rejected() {
        let truncated = &SMALL_INSTANCE[..SMALL_INSTANCE.len() / 2];
        assert!(parse_sas(truncated).is_err());
    }

    #[test]
    fn axioms_are_rejected() {
        let instance = SMALL_INSTANCE.replacen("end_operator\n0", "end_operator\n1", 1);
        assert!(parse_sas(&instance).is_err());
    }
}
