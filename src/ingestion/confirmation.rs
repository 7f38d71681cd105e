//! Confirmation hooks for actions an interactive import proposes

use std::fmt;

/// An action that needs the caller's approval before the pipeline proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposedAction {
    CreateTable {
        table: String,
        ddl: String,
    },
    PartialMapping {
        table: String,
        mapped: Vec<(String, String)>,
        unmapped: Vec<String>,
        available: Vec<String>,
    },
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposedAction::CreateTable { table, ddl } => {
                writeln!(f, "Proposed structure for table '{}':", table)?;
                writeln!(f, "{}", ddl)?;
                write!(f, "Create this table?")
            }
            ProposedAction::PartialMapping {
                table,
                mapped,
                unmapped,
                available,
            } => {
                writeln!(f, "Column mapping for table '{}':", table)?;
                for (header, column) in mapped {
                    writeln!(f, "  CSV '{}' -> column '{}'", header, column)?;
                }
                writeln!(f, "Unmapped CSV columns:")?;
                for header in unmapped {
                    writeln!(f, "  - {}", header)?;
                }
                writeln!(f, "Available table columns: {}", available.join(", "))?;
                write!(f, "Continue with partial mapping?")
            }
        }
    }
}

pub trait ConfirmationPolicy {
    fn approve(&mut self, action: &ProposedAction) -> bool;
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ConfirmationPolicy for AutoApprove {
    fn approve(&mut self, _action: &ProposedAction) -> bool {
        true
    }
}

/// Rejects everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deny;

impl ConfirmationPolicy for Deny {
    fn approve(&mut self, _action: &ProposedAction) -> bool {
        false
    }
}

impl<F> ConfirmationPolicy for F
where
    F: FnMut(&ProposedAction) -> bool,
{
    fn approve(&mut self, action: &ProposedAction) -> bool {
        self(action)
    }
}
