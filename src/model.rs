pub mod displ;
pub mod head;
pub mod info;
pub mod mode;
pub mod output_manager;

pub use displ::{Displ, TransactionStatus};
pub use head::{Desired, Head, HeadId, Pending, Scale, Transform};
pub use mode::{Mode, ModeId};
pub use output_manager::{DepartedHead, OutputManager};
