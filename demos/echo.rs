//! Bare-bones echo server driven by the reactor's public surface.
//!
//! Run with `cargo run --example echo`, then `nc 127.0.0.1 7878`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use tickloop::{Engine, Interest, Reactor};

type Connections = Rc<RefCell<HashMap<RawFd, TcpStream>>>;

fn main() -> io::Result<()> {
    let addr = "127.0.0.1:7878".parse().expect("static address parses");
    let listener = TcpListener::bind(addr)?;
    let listener_fd = listener.as_raw_fd();
    let connections: Connections = Rc::new(RefCell::new(HashMap::new()));

    let mut reactor = Reactor::new();

    let accept_connections = connections.clone();
    reactor.attach(listener_fd, Interest::READ, move |reactor, _event| {
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    println!("echo: {peer} connected");
                    let fd = stream.as_raw_fd();
                    accept_connections.borrow_mut().insert(fd, stream);
                    let read_connections = accept_connections.clone();
                    let attached = reactor.attach(fd, Interest::READ, move |reactor, event| {
                        serve(reactor, event.fd(), &read_connections);
                    });
                    if let Err(err) = attached {
                        eprintln!("echo: attach failed: {err}");
                        accept_connections.borrow_mut().remove(&fd);
                    }
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    eprintln!("echo: accept failed: {err}");
                    break;
                }
            }
        }
    })?;

    arm_stats_timer(&mut reactor, connections);

    reactor.run(move |reactor| {
        reactor.next_tick(move |_| {
            println!("echo: listening on {addr} ({:?} engine)", Engine::detect());
        });
    })
}

fn serve(reactor: &mut Reactor, fd: RawFd, connections: &Connections) {
    let mut buf = [0u8; 4096];
    let mut connections = connections.borrow_mut();
    let Some(stream) = connections.get_mut(&fd) else {
        return;
    };
    // notifications are edge-style, so drain until the socket runs dry
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                reactor.detach(fd);
                connections.remove(&fd);
                println!("echo: connection closed");
                break;
            }
            Ok(n) => {
                if let Err(err) = stream.write_all(&buf[..n]) {
                    eprintln!("echo: write failed: {err}");
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                eprintln!("echo: read failed: {err}");
                reactor.detach(fd);
                connections.remove(&fd);
                break;
            }
        }
    }
}

fn arm_stats_timer(reactor: &mut Reactor, connections: Connections) {
    reactor.add_timer(Duration::from_secs(30), move |reactor| {
        println!("echo: {} connection(s) open", connections.borrow().len());
        arm_stats_timer(reactor, connections);
    });
}
