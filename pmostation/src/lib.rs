//! # pmostation - Boucle de la station PMORadio
//!
//! Relie l'ordonnanceur de `pmoqueue` aux workers de `pmobroadcast` :
//! chaque morceau dépilé est diffusé sur tous les points de montage, et le
//! suivant n'est dépilé qu'une fois tous les workers terminés.

pub mod logs;
mod station;

pub use logs::{init_logging, LogHandle};
pub use station::{Cycle, Station};
