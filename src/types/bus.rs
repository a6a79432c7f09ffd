/// A physical bus the database describes.
#[derive(Default, Clone, PartialEq, Debug)]
pub struct Bus {
    pub name: String,
    pub comment: Option<String>,
    /// Nominal bit rate in bit/s.
    pub baudrate: Option<u32>,
    /// CAN-FD data-phase bit rate in bit/s.
    pub fd_baudrate: Option<u32>,
    pub is_fd: bool,
}

impl Bus {
    pub fn new(name: impl Into<String>) -> Self {
        Bus {
            name: name.into(),
            ..Default::default()
        }
    }
}
