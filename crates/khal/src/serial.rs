//! Serial port (COM1 UART 16550) driver.

use core::fmt;

use crate::port::PortIo;

/// COM1 base port address
pub const COM1_PORT: u16 = 0x3F8;

/// Serial port driver for COM1
pub struct Serial<P> {
    io: P,
    initialized: bool,
}

impl<P: PortIo> Serial<P> {
    /// Create a new uninitialized Serial port instance
    pub const fn new(io: P) -> Self {
        Self {
            io,
            initialized: false,
        }
    }

    /// Initialize the serial port (115200 baud, 8N1)
    ///
    /// Returns whether the loopback self-test passed. The port is used either
    /// way; the board may simply have nothing attached.
    pub fn init(&mut self) -> bool {
        let io = &self.io;

        // Disable all interrupts
        io.outb(COM1_PORT + 1, 0x00);

        // Enable DLAB (set baud rate divisor)
        io.outb(COM1_PORT + 3, 0x80);

        // Set divisor to 1 (115200 baud)
        io.outb(COM1_PORT, 0x01); // Divisor low byte
        io.outb(COM1_PORT + 1, 0x00); // Divisor high byte

        // 8 bits, no parity, one stop bit (clear DLAB)
        io.outb(COM1_PORT + 3, 0x03);

        // Enable FIFO, clear them, with 14-byte threshold
        io.outb(COM1_PORT + 2, 0xC7);

        // Put chip in loopback mode to test
        io.outb(COM1_PORT + 4, 0x1E);

        // Send test byte and check we receive it back
        io.outb(COM1_PORT, 0xAE);
        let loopback_ok = io.inb(COM1_PORT) == 0xAE;

        // Normal operation (OUT1, OUT2, RTS, DTR), still polled
        io.outb(COM1_PORT + 4, 0x0F);
        io.outb(COM1_PORT + 1, 0x00);

        self.initialized = true;
        loopback_ok
    }

    /// Check if transmit buffer is empty
    fn is_transmit_empty(&self) -> bool {
        self.io.inb(COM1_PORT + 5) & 0x20 != 0
    }

    /// Write a byte to the serial port
    pub fn write_byte(&self, byte: u8) {
        if !self.initialized {
            return;
        }

        // Wait for transmit buffer to be empty
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }

        self.io.outb(COM1_PORT, byte);
    }

    /// Write a string to the serial port
    pub fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
    }
}

impl<P: PortIo> fmt::Write for Serial<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Serial::write_str(self, s);
        Ok(())
    }
}
