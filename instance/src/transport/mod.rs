cfg_if! {
    if #[cfg(feature = "transport_tcp")] {
        mod tcp;
        pub use tcp::TcpConnector;
    } else {}
}
cfg_if! {
    if #[cfg(feature = "transport_udp")] {
        mod udp;
        pub use udp::UdpChannel;
    } else {}
}
