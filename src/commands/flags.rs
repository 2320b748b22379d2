use bitflags::bitflags;

bitflags! {
    /// Routing and behaviour flags of a command
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandFlags: u16 {
        /// Only the primary may execute the command
        const DEMAND_MASTER = 1 << 0;
        /// Primary if available, replica otherwise. Default if no role flag is set.
        const PREFER_MASTER = 1 << 1;
        /// Only a replica may execute the command
        const DEMAND_REPLICA = 1 << 2;
        /// Replica if available, primary otherwise
        const PREFER_REPLICA = 1 << 3;
        /// MOVED/ASK replies are returned to the caller as error
        const NO_REDIRECT = 1 << 4;
        /// Command requires admin mode
        const ADMIN = 1 << 5;
    }
}

impl CommandFlags {
    /// Flags affecting server role selection
    pub const ROLE_MASK: CommandFlags = CommandFlags::DEMAND_MASTER
        .union(CommandFlags::PREFER_MASTER)
        .union(CommandFlags::DEMAND_REPLICA)
        .union(CommandFlags::PREFER_REPLICA);

    /// True if a replica may serve the command
    pub fn allows_replica(&self) -> bool {
        !self.contains(CommandFlags::DEMAND_MASTER)
    }

    /// True if a primary may serve the command
    pub fn allows_master(&self) -> bool {
        !self.contains(CommandFlags::DEMAND_REPLICA)
    }

    /// True if replicas are preferred over the primary
    pub fn prefers_replica(&self) -> bool {
        self.intersects(CommandFlags::DEMAND_REPLICA | CommandFlags::PREFER_REPLICA)
    }
}
