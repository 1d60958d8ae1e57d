use std::mem;

/// Token for a gate with nothing in flight. Only this module can mint one.
#[derive(Debug, PartialEq, Eq)]
pub struct Idle(());

/// Token for a gate with one action in flight. It can only be obtained by
/// consuming an [`Idle`], and only turns back into one through [`Acting::finish`].
#[derive(Debug, PartialEq, Eq)]
pub struct Acting<A>(A);

impl Idle {
    pub fn begin<A>(self, action: A) -> Acting<A> {
        Acting(action)
    }
}

impl<A> Acting<A> {
    pub fn action(&self) -> &A {
        &self.0
    }

    pub fn finish(self) -> (Idle, A) {
        (Idle(()), self.0)
    }
}

/// At-most-one-in-flight state machine: `Idle -> Acting -> Idle`.
#[derive(Debug, PartialEq, Eq)]
pub enum Gate<A> {
    Idle(Idle),
    Acting(Acting<A>),
}

impl<A> Default for Gate<A> {
    fn default() -> Self {
        Gate::Idle(Idle(()))
    }
}

impl<A> Gate<A> {
    /// Moves to `Acting` and returns `true`, or leaves an in-flight action
    /// untouched and returns `false`.
    pub fn try_begin(&mut self, action: A) -> bool {
        match mem::take(self) {
            Gate::Idle(idle) => {
                *self = Gate::Acting(idle.begin(action));
                true
            }
            acting => {
                *self = acting;
                false
            }
        }
    }

    /// Returns to `Idle`, handing back the action that was in flight.
    pub fn finish(&mut self) -> Option<A> {
        match mem::take(self) {
            Gate::Acting(acting) => {
                let (idle, action) = acting.finish();
                *self = Gate::Idle(idle);
                Some(action)
            }
            idle => {
                *self = idle;
                None
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Gate::Idle(_))
    }

    pub fn current(&self) -> Option<&A> {
        match self {
            Gate::Acting(acting) => Some(acting.action()),
            Gate::Idle(_) => None,
        }
    }
}
