mod expense;
mod ledger;
mod member;
mod money;
mod payment;
mod settlement;
mod trip;

pub use expense::*;
pub use ledger::*;
pub use member::*;
pub use money::*;
pub use payment::*;
pub use settlement::*;
pub use trip::*;
