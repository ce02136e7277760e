pub mod registry;

pub use registry::{KernelFn, KernelRegistry, ResolvedKernel, Term, default_registry};

use std::fmt;

use crate::arrays::datatype::{DataType, DataTypeId};

/// Type variable in a kernel signature. Slots sharing a variable must
/// resolve to the same concrete element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVar(pub char);

/// Element type of a signature slot: a variable that unifies across slots,
/// or a concrete type id (`Any` matches without binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotElement {
    Var(TypeVar),
    Exact(DataTypeId),
}

/// One argument or result slot: a broadcast marker plus an element type.
///
/// Columnar slots accept scalar operands (the scalar broadcasts across the
/// group); scalar slots do not accept columnar operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSlot {
    pub columnar: bool,
    pub element: SlotElement,
}

impl TypeSlot {
    pub const fn columnar_var(var: char) -> Self {
        TypeSlot {
            columnar: true,
            element: SlotElement::Var(TypeVar(var)),
        }
    }

    pub const fn columnar(id: DataTypeId) -> Self {
        TypeSlot {
            columnar: true,
            element: SlotElement::Exact(id),
        }
    }

    pub const fn scalar_var(var: char) -> Self {
        TypeSlot {
            columnar: false,
            element: SlotElement::Var(TypeVar(var)),
        }
    }

    pub const fn scalar(id: DataTypeId) -> Self {
        TypeSlot {
            columnar: false,
            element: SlotElement::Exact(id),
        }
    }
}

/// Shape of an operand or result as seen by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermShape {
    pub columnar: bool,
    pub datatype: DataType,
}

impl TermShape {
    pub const fn column(datatype: DataType) -> Self {
        TermShape {
            columnar: true,
            datatype,
        }
    }

    pub const fn scalar(datatype: DataType) -> Self {
        TermShape {
            columnar: false,
            datatype,
        }
    }
}

impl fmt::Display for TermShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columnar {
            write!(f, "{} column", self.datatype)
        } else {
            write!(f, "{} scalar", self.datatype)
        }
    }
}

/// Kernel signature: a pattern template over operand shapes.
///
/// Built once at registration time as structured data, never re-parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Expected positional operand slots.
    pub positional_args: Vec<TypeSlot>,
    /// Slot for trailing variadic operands, if the kernel is variadic.
    pub variadic_arg: Option<TypeSlot>,
    /// The result slot.
    pub return_type: TypeSlot,
}

impl Signature {
    pub fn new(positional_args: impl Into<Vec<TypeSlot>>, return_type: TypeSlot) -> Self {
        Signature {
            positional_args: positional_args.into(),
            variadic_arg: None,
            return_type,
        }
    }

    pub fn variadic(
        positional_args: impl Into<Vec<TypeSlot>>,
        variadic_arg: TypeSlot,
        return_type: TypeSlot,
    ) -> Self {
        Signature {
            positional_args: positional_args.into(),
            variadic_arg: Some(variadic_arg),
            return_type,
        }
    }

    pub const fn is_variadic(&self) -> bool {
        self.variadic_arg.is_some()
    }

    /// Unify the signature with actual operand shapes.
    ///
    /// Returns the result shape on success, None if the operands do not
    /// satisfy the signature. The result is columnar iff the result slot is
    /// columnar and at least one operand is (an all-scalar application of a
    /// columnar signature produces a scalar).
    pub fn unify(&self, operands: &[TermShape]) -> Option<TermShape> {
        if self.is_variadic() {
            if operands.len() < self.positional_args.len() {
                return None;
            }
        } else if operands.len() != self.positional_args.len() {
            return None;
        }

        let mut bindings: Vec<(TypeVar, DataType)> = Vec::new();

        for (slot, shape) in self.positional_args.iter().zip(operands.iter()) {
            if !Self::check_slot(slot, shape, &mut bindings) {
                return None;
            }
        }

        if let Some(variadic) = &self.variadic_arg {
            for shape in &operands[self.positional_args.len()..] {
                if !Self::check_slot(variadic, shape, &mut bindings) {
                    return None;
                }
            }
        }

        let columnar = self.return_type.columnar && operands.iter().any(|o| o.columnar);
        let datatype = match self.return_type.element {
            SlotElement::Var(var) => bindings.iter().find(|(v, _)| *v == var).map(|(_, dt)| *dt)?,
            SlotElement::Exact(id) => id.to_datatype()?,
        };

        Some(TermShape { columnar, datatype })
    }

    fn check_slot(
        slot: &TypeSlot,
        shape: &TermShape,
        bindings: &mut Vec<(TypeVar, DataType)>,
    ) -> bool {
        if !slot.columnar && shape.columnar {
            return false;
        }

        match slot.element {
            SlotElement::Exact(DataTypeId::Any) => true,
            SlotElement::Exact(id) => shape.datatype.datatype_id() == id,
            SlotElement::Var(var) => match bindings.iter().find(|(v, _)| *v == var) {
                Some((_, bound)) => *bound == shape.datatype,
                None => {
                    bindings.push((var, shape.datatype));
                    true
                }
            },
        }
    }
}
