//! Domain layer - Core business objects and abstractions
//! 
//! This layer contains:
//! - Entities: Core business objects (User, Message, Command, Role)
//! - Traits: Abstractions for infrastructure (Transport, PersistenceConfigurator)

pub mod entities;
pub mod traits;
