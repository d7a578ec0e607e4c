//! Raw-socket layer-2 injection.
//!
//! Grounded on this corpus's `socket2::Socket::new` + raw-`libc` binding
//! style (see `boringtun::device::peer::connect_endpoint`), adapted from a
//! connected UDP socket to an `AF_PACKET`/`SOCK_RAW` socket bound to one
//! interface index for layer-2 send.

use std::io;
use std::mem;
use std::os::unix::io::AsRawFd;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::PipelineError;

/// Sends raw Ethernet frames out a single bound interface.
pub struct Injector {
    socket: Socket,
    ifindex: i32,
}

impl Injector {
    pub fn open(iface: &str) -> Result<Self, PipelineError> {
        let ifindex = interface_index(iface).map_err(|source| PipelineError::InjectorOpen {
            iface: iface.to_string(),
            source,
        })?;

        // ETH_P_ALL, network byte order, as libc::socket's protocol argument expects.
        let eth_p_all = (libc::ETH_P_ALL as u16).to_be() as i32;
        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(eth_p_all)),
        )
        .map_err(|source| PipelineError::InjectorOpen {
            iface: iface.to_string(),
            source,
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| PipelineError::InjectorOpen {
                iface: iface.to_string(),
                source,
            })?;

        bind_to_interface(&socket, ifindex).map_err(|source| PipelineError::InjectorOpen {
            iface: iface.to_string(),
            source,
        })?;

        Ok(Self { socket, ifindex })
    }

    /// Sends `frame` on the bound interface.
    ///
    /// A transient send-buffer-full condition (`EWOULDBLOCK`/`EAGAIN`,
    /// `ENOBUFS`) is silently ignored: dropping is preferable to blocking
    /// under IRQ storms. Any other error is fatal.
    pub fn send(&self, frame: &[u8]) -> Result<(), PipelineError> {
        let fd = self.socket.as_raw_fd();
        let n = unsafe { libc::send(fd, frame.as_ptr() as *const libc::c_void, frame.len(), 0) };
        if n >= 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EWOULDBLOCK) | Some(libc::ENOBUFS) => Ok(()),
            _ => Err(PipelineError::SendFailed(err)),
        }
    }

    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }
}

fn interface_index(iface: &str) -> io::Result<i32> {
    let c_name = std::ffi::CString::new(iface)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name has a NUL byte"))?;
    let idx = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if idx == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(idx as i32)
}

fn bind_to_interface(socket: &Socket, ifindex: i32) -> io::Result<()> {
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
    addr.sll_ifindex = ifindex;

    let res = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as u32,
        )
    };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
